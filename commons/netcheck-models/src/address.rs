use std::net::IpAddr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    /// Classify a textual address. Returns `None` for anything that is not a
    /// plain IPv4 or IPv6 literal (hostnames, CIDRs, empty strings).
    pub fn classify(addr: &str) -> Option<IpFamily> {
        match addr.trim().parse::<IpAddr>().ok()? {
            IpAddr::V4(_) => Some(IpFamily::V4),
            IpAddr::V6(v6) => {
                // ::ffff:a.b.c.d is reported as v4, same as the cluster does
                if v6.to_ipv4_mapped().is_some() {
                    Some(IpFamily::V4)
                } else {
                    Some(IpFamily::V6)
                }
            }
        }
    }
}

impl std::fmt::Display for IpFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpFamily::V4 => write!(f, "ipv4"),
            IpFamily::V6 => write!(f, "ipv6"),
        }
    }
}

/// Which address families a test run exercises.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FamilyFilter {
    pub ipv4: bool,
    pub ipv6: bool,
}

impl Default for FamilyFilter {
    fn default() -> Self {
        Self {
            ipv4: true,
            ipv6: false,
        }
    }
}

impl FamilyFilter {
    pub fn dual_stack() -> Self {
        Self {
            ipv4: true,
            ipv6: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.ipv4 && !self.ipv6
    }

    pub fn allows_family(&self, family: IpFamily) -> bool {
        match family {
            IpFamily::V4 => self.ipv4,
            IpFamily::V6 => self.ipv6,
        }
    }

    /// Unparseable addresses are never allowed.
    pub fn allows(&self, addr: &str) -> bool {
        IpFamily::classify(addr)
            .map(|f| self.allows_family(f))
            .unwrap_or(false)
    }

    pub fn retain<I, S>(&self, addrs: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        addrs
            .into_iter()
            .filter(|a| self.allows(a.as_ref()))
            .map(|a| a.as_ref().to_string())
            .collect()
    }
}
