use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use shared::utilities::errors::AppError;

use crate::rdesc;

use super::executable::RuleImpl;

/// A sleep boundary, uniform over `[min, max]` seconds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    min: u64,
    max: u64,
}

impl Period {
    /// Parses `"random(min,max)"`. An empty string means "run once" (`None`).
    pub fn parse(raw: &str) -> Result<Option<Period>, AppError> {
        if raw.is_empty() {
            return Ok(None);
        }

        let inner = raw
            .strip_prefix("random(")
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(|| AppError::InvalidPeriod(raw.to_string()))?;

        let mut parts = inner.split(',');
        let min = parts
            .next()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .ok_or_else(|| AppError::InvalidPeriod(raw.to_string()))?;
        let max = parts
            .next()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .ok_or_else(|| AppError::InvalidPeriod(raw.to_string()))?;

        if parts.next().is_some() {
            return Err(AppError::InvalidPeriod(raw.to_string()));
        }
        if min > max {
            return Err(AppError::InvalidPeriod(raw.to_string()));
        }

        Ok(Some(Period { min, max }))
    }

    /// Sleeps for a jittered duration in `[min, max]`, or until `cancel`
    /// fires, whichever comes first.
    pub async fn sleep(&self, cancel: &CancellationToken) {
        let secs = if self.min == self.max {
            self.min
        } else {
            rand::rng().random_range(self.min..=self.max)
        };

        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
        }
    }
}

/// A fully instantiated rule: its parsed period plus the boxed
/// implementation the factory built from the descriptor.
pub struct Rule {
    pub act: rdesc::Act,
    pub period: Option<Period>,
    pub imp: Box<dyn RuleImpl>,
}

impl Rule {
    pub fn new(desc: &rdesc::Rule, imp: Box<dyn RuleImpl>) -> Result<Self, AppError> {
        let period = Period::parse(&desc.periodic)?;
        Ok(Rule {
            act: desc.act,
            period,
            imp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_period_runs_once() {
        assert_eq!(Period::parse("").unwrap(), None);
    }

    #[test]
    fn equal_bounds_is_allowed() {
        let p = Period::parse("random(5,5)").unwrap().unwrap();
        assert_eq!(p.min, 5);
        assert_eq!(p.max, 5);
    }

    #[test]
    fn inverted_bounds_fail() {
        assert!(Period::parse("random(10,5)").is_err());
    }

    #[test]
    fn malformed_grammar_fails() {
        assert!(Period::parse("hourly").is_err());
        assert!(Period::parse("random(5)").is_err());
        assert!(Period::parse("random(5,6,7)").is_err());
        assert!(Period::parse("random(a,b)").is_err());
    }

    #[tokio::test]
    async fn sleep_respects_cancellation() {
        let p = Period::parse("random(60,60)").unwrap().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        tokio::time::timeout(Duration::from_millis(200), p.sleep(&cancel))
            .await
            .expect("sleep should return immediately once cancelled");
    }
}
