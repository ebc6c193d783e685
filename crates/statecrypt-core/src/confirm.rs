//! Confirmation capability injected into operations that may destroy data.
//!
//! Interactive frontends prompt the user; force and non-interactive modes
//! answer without asking.

use crate::error::Result;

/// Answers yes/no questions on behalf of the user.
pub trait Confirmer {
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Always answers yes (force mode).
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysConfirm;

impl Confirmer for AlwaysConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Always answers no (non-interactive mode).
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverConfirm;

impl Confirmer for NeverConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

impl<F> Confirmer for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        Ok(self(prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_confirmer_sees_prompt() {
        let mut seen = Vec::new();
        let mut confirmer = |prompt: &str| {
            seen.push(prompt.to_string());
            prompt.contains("yes")
        };

        assert!(confirmer.confirm("say yes").unwrap());
        assert!(!confirmer.confirm("say no").unwrap());
        drop(confirmer);
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_fixed_confirmers() {
        assert!(AlwaysConfirm.confirm("overwrite?").unwrap());
        assert!(!NeverConfirm.confirm("overwrite?").unwrap());
    }
}
