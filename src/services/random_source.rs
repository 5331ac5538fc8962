use crate::config::{RandomOrgConfig, ShortenerConfig};
use crate::error::AppResult;
use crate::external::{LinkShortener, RandomOrgClient, RandomOrgError, SignedInteger};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::sync::Mutex;

/// What a draw hands to the draw engine. The link is present only when the
/// value came from the signed source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawOutcome {
    pub winning_number: i64,
    pub verification_link: Option<String>,
}

/// Which capability serves a draw. Unavailable or malformed signed results
/// select the fallback; nothing else does.
#[derive(Debug)]
pub enum Strategy {
    Signed(SignedInteger),
    Fallback(RandomOrgError),
}

impl From<Result<SignedInteger, RandomOrgError>> for Strategy {
    fn from(attempt: Result<SignedInteger, RandomOrgError>) -> Self {
        match attempt {
            Ok(signed) => Strategy::Signed(signed),
            Err(reason) => Strategy::Fallback(reason),
        }
    }
}

/// random.org signed integers with optional is.gd shortening of the proof link
#[derive(Clone)]
struct SignedSource {
    client: RandomOrgClient,
    shortener: Option<LinkShortener>,
}

impl SignedSource {
    async fn verification_link(&self, signed: &SignedInteger) -> Option<String> {
        let url = signed.verification_url()?;
        match &self.shortener {
            Some(shortener) => Some(shortener.shorten(&url).await),
            None => Some(url),
        }
    }
}

/// Local PRNG. Never fails.
#[derive(Clone)]
struct FallbackSource {
    rng: Arc<Mutex<StdRng>>,
}

impl FallbackSource {
    fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    async fn draw(&self, upper: i64) -> i64 {
        let upper = upper.max(1);
        self.rng.lock().await.gen_range(1..=upper)
    }
}

#[derive(Clone)]
pub struct RandomSource {
    signed: Option<SignedSource>,
    fallback: FallbackSource,
}

impl RandomSource {
    pub fn new(random_org: &RandomOrgConfig, shortener: ShortenerConfig) -> AppResult<Self> {
        let client = RandomOrgClient::new(random_org)?;
        let signed = if client.is_enabled() {
            let shortener = LinkShortener::new(shortener)?;
            Some(SignedSource {
                client,
                shortener: shortener.is_enabled().then_some(shortener),
            })
        } else {
            log::info!("RANDOM_API_KEY not set, draws will use the local generator");
            None
        };

        Ok(Self {
            signed,
            fallback: FallbackSource::new(None),
        })
    }

    /// Local generator only; a fixed seed makes draws reproducible.
    pub fn fallback_only(seed: Option<u64>) -> Self {
        Self {
            signed: None,
            fallback: FallbackSource::new(seed),
        }
    }

    pub fn is_verifiable(&self) -> bool {
        self.signed.is_some()
    }

    /// Draw one integer in `[1, upper]`.
    pub async fn draw(&self, upper: i64) -> DrawOutcome {
        let attempt = match &self.signed {
            Some(source) => source.client.generate_signed_integer(upper).await,
            None => Err(RandomOrgError::Unconfigured),
        };

        match Strategy::from(attempt) {
            Strategy::Signed(signed) => {
                let verification_link = match &self.signed {
                    Some(source) => source.verification_link(&signed).await,
                    None => None,
                };
                log::info!(
                    "Signed draw in [1, {upper}] -> {} (verification link: {})",
                    signed.value,
                    verification_link.is_some()
                );
                DrawOutcome {
                    winning_number: signed.value,
                    verification_link,
                }
            }
            Strategy::Fallback(reason) => {
                let winning_number = self.fallback.draw(upper).await;
                match reason {
                    RandomOrgError::Unconfigured => {
                        log::debug!("Local draw in [1, {upper}] -> {winning_number}")
                    }
                    other => log::warn!(
                        "random.org unavailable ({other}), local draw in [1, {upper}] -> {winning_number}"
                    ),
                }
                DrawOutcome {
                    winning_number,
                    verification_link: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fallback_stays_in_range() {
        let source = RandomSource::fallback_only(Some(7));
        for upper in [1, 2, 4, 10, 100] {
            for _ in 0..50 {
                let outcome = source.draw(upper).await;
                assert!((1..=upper).contains(&outcome.winning_number));
                assert_eq!(outcome.verification_link, None);
            }
        }
    }

    #[tokio::test]
    async fn test_seeded_fallback_is_reproducible() {
        let a = RandomSource::fallback_only(Some(99));
        let b = RandomSource::fallback_only(Some(99));
        for _ in 0..20 {
            assert_eq!(a.draw(1000).await, b.draw(1000).await);
        }
    }

    #[tokio::test]
    async fn test_unreachable_service_falls_back() {
        let source = RandomSource::new(
            &RandomOrgConfig {
                api_key: "test-key".to_string(),
                endpoint: "http://127.0.0.1:9/json-rpc/4/invoke".to_string(),
                timeout_secs: 1,
            },
            ShortenerConfig::default(),
        )
        .unwrap();
        assert!(source.is_verifiable());

        let outcome = source.draw(4).await;
        assert!((1..=4).contains(&outcome.winning_number));
        assert_eq!(outcome.verification_link, None);
    }

    #[test]
    fn test_strategy_selection() {
        assert!(matches!(
            Strategy::from(Err(RandomOrgError::Timeout)),
            Strategy::Fallback(RandomOrgError::Timeout)
        ));
        let signed = SignedInteger {
            value: 2,
            random_json: "{}".into(),
            signature: "sig".into(),
        };
        assert!(matches!(Strategy::from(Ok(signed)), Strategy::Signed(_)));
    }
}
