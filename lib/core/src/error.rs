//! The `Result` alias shared by the openid-gate crates.
//!
//! Each crate keeps its own error enums. A layer that receives a report
//! from the layer below wraps it into one of its own kinds, so a report
//! always names the concern that failed at the boundary it crossed.

use rootcause::Report;

/// A `Result` whose error is a rootcause report over `C`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Lost;

    impl fmt::Display for Lost {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "session lost")
        }
    }

    impl std::error::Error for Lost {}

    fn lookup(found: bool) -> Result<&'static str, Lost> {
        if found {
            return Ok("alice");
        }
        Err(Lost.into())
    }

    #[test]
    fn result_carries_a_report_of_the_context() {
        assert_eq!(lookup(true).expect("should be ok"), "alice");
        let err = lookup(false).expect_err("should fail");
        assert!(err.to_string().contains("session lost"));
    }
}
