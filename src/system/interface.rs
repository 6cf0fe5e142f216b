use std::{fmt::Display, num::ParseIntError, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(libc::pid_t);

impl ProcessId {
    pub fn new(id: libc::pid_t) -> Self {
        Self(id)
    }

    pub fn get(&self) -> libc::pid_t {
        self.0
    }
}

impl Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProcessId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<libc::pid_t>().map(ProcessId::new)
    }
}

#[cfg(test)]
mod test {
    use super::ProcessId;

    #[test]
    fn display_and_parse() {
        let pid = ProcessId::new(4242);
        assert_eq!(pid.to_string(), "4242");
        assert_eq!("4242".parse::<ProcessId>().unwrap(), pid);
        assert!("not-a-pid".parse::<ProcessId>().is_err());
    }
}
