/// DNS-1123 safe alphabet for generated suffixes.
pub const DIGITS: [char; 10] =
    ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];

pub fn uniq(prefix: &str) -> String {
    format!("{prefix}-{}", nanoid::nanoid!(6, &DIGITS))
}

/// Namespace name in the `ns<digits>` shape the suites use.
pub fn random_namespace() -> String {
    format!("ns{}", nanoid::nanoid!(8, &DIGITS))
}
