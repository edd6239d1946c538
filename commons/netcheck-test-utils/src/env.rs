//! Environment variable helpers for config tests.
//!
//! Setting process env is unsafe on edition 2024; the guard restores the
//! previous value (or unsets the key) when dropped.

pub struct EnvGuard {
    key: String,
    prev: Option<String>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        unsafe {
            if let Some(ref v) = self.prev {
                std::env::set_var(&self.key, v);
            } else {
                std::env::remove_var(&self.key);
            }
        }
    }
}

pub fn set_env_guarded(key: &str, val: &str) -> EnvGuard {
    let prev = std::env::var(key).ok();
    unsafe {
        std::env::set_var(key, val);
    }
    EnvGuard {
        key: key.to_string(),
        prev,
    }
}

/// Apply multiple env vars, returning guards in the same order.
pub fn set_envs_guarded<'a, I>(kvs: I) -> Vec<EnvGuard>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    kvs.into_iter()
        .map(|(k, v)| set_env_guarded(k, v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_previous_state() {
        let key = "NETCHECK_TEST_UTILS_GUARD";
        {
            let _g = set_env_guarded(key, "1");
            assert_eq!(std::env::var(key).as_deref(), Ok("1"));
            {
                let _inner = set_envs_guarded([(key, "2")]);
                assert_eq!(std::env::var(key).as_deref(), Ok("2"));
            }
            assert_eq!(std::env::var(key).as_deref(), Ok("1"));
        }
        assert!(std::env::var(key).is_err());
    }
}
