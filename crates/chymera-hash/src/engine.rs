//! SHA-256 transform selection.
//!
//! The process installs one [`Sha256Engine`] on first use. Detection probes the
//! CPU, builds the best bundle of transforms it supports and runs the
//! known-answer self-test on it; an engine that fails the self-test is never
//! installed.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use tracing::{debug, info, warn};

use crate::config::{HashConfig, StrategyPreference};
use crate::error::HashError;
use crate::selftest;
use crate::sha256;

/// Single-block transform: advance the state over every 64-byte block.
pub type TransformFn = fn(&mut [u32; 8], &[u8]);

/// Double-SHA-256 of a fixed number of 64-byte blocks into 32-byte digests.
pub type D64Fn = fn(&mut [u8], &[u8]);

/// A SHA-256 implementation family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Portable scalar compression with a 1-way double hash.
    Standard,
    /// The portable compression compiled with SSE4.1 code generation, plus
    /// the 4-way SSE4.1 double-hash batch. Not a hand-scheduled transform.
    Sse4,
    /// [`Strategy::Sse4`] plus the 8-way AVX2 double-hash batch.
    Avx2,
    /// SHA extension instructions for the transform and the 2-way batch.
    ShaNi,
}

impl Strategy {
    /// Every strategy, in order of increasing hardware requirements.
    pub const ALL: [Strategy; 4] = [
        Strategy::Standard,
        Strategy::Sse4,
        Strategy::Avx2,
        Strategy::ShaNi,
    ];

    /// The name accepted by [`FromStr`] and printed by [`fmt::Display`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Standard => "standard",
            Strategy::Sse4 => "sse4",
            Strategy::Avx2 => "avx2",
            Strategy::ShaNi => "shani",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| HashError::UnknownStrategy(s.to_string()))
    }
}

/// CPU capabilities relevant to SHA-256.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuFeatures {
    /// SSE4.1.
    pub sse41: bool,
    /// AVX with OS support for the YMM state.
    pub avx: bool,
    /// AVX2.
    pub avx2: bool,
    /// SHA extensions.
    pub shani: bool,
}

impl CpuFeatures {
    /// Query the running CPU.
    #[cfg(target_arch = "x86_64")]
    pub fn probe() -> Self {
        CpuFeatures {
            sse41: is_x86_feature_detected!("sse4.1"),
            avx: is_x86_feature_detected!("avx"),
            avx2: is_x86_feature_detected!("avx2"),
            shani: is_x86_feature_detected!("sha"),
        }
    }

    /// No x86 features off x86_64.
    #[cfg(not(target_arch = "x86_64"))]
    pub fn probe() -> Self {
        CpuFeatures::default()
    }

    /// Whether `strategy` can run on a CPU with these features.
    ///
    /// # Arguments
    /// * `strategy` - The strategy to check
    ///
    /// # Returns
    /// `true` if every instruction set the strategy needs is present.
    pub fn supports(&self, strategy: Strategy) -> bool {
        match strategy {
            Strategy::Standard => true,
            Strategy::Sse4 => self.sse41,
            Strategy::Avx2 => self.sse41 && self.avx && self.avx2,
            Strategy::ShaNi => self.sse41 && self.shani,
        }
    }

    /// SHA-NI beats the multi-lane paths; AVX2 extends SSE4.1 with an 8-way
    /// batch.
    pub fn best(&self) -> Strategy {
        [Strategy::ShaNi, Strategy::Avx2, Strategy::Sse4]
            .into_iter()
            .find(|strategy| self.supports(*strategy))
            .unwrap_or(Strategy::Standard)
    }
}

/// Immutable bundle of the transforms used for SHA-256.
///
/// The 1-way double-hash is always present; the 2/4/8-way batches are set only
/// by the strategies that provide them.
#[derive(Clone, Copy)]
pub struct Sha256Engine {
    pub(crate) strategy: Strategy,
    pub(crate) transform_fn: TransformFn,
    pub(crate) d64: D64Fn,
    pub(crate) d64_2way: Option<D64Fn>,
    pub(crate) d64_4way: Option<D64Fn>,
    pub(crate) d64_8way: Option<D64Fn>,
    pub(crate) description: &'static str,
}

impl Sha256Engine {
    /// The portable implementation, available everywhere.
    pub fn standard() -> Self {
        Sha256Engine {
            strategy: Strategy::Standard,
            transform_fn: sha256::transform,
            d64: sha256::double_sha256_64,
            d64_2way: None,
            d64_4way: None,
            d64_8way: None,
            description: "standard",
        }
    }

    /// Build and self-test the engine for `strategy`.
    ///
    /// # Returns
    /// `HashError::Unsupported` if the CPU lacks the required features.
    ///
    /// # Panics
    /// If the built engine fails the self-test.
    pub fn for_strategy(strategy: Strategy) -> Result<Self, HashError> {
        Self::for_strategy_on(strategy, &CpuFeatures::probe())
    }

    fn for_strategy_on(strategy: Strategy, cpu: &CpuFeatures) -> Result<Self, HashError> {
        if !cpu.supports(strategy) {
            return Err(HashError::Unsupported(strategy));
        }
        let engine = Self::build(strategy);
        if let Err(err) = engine.self_test() {
            panic!("{err}");
        }
        Ok(engine)
    }

    /// Build the engine for the best strategy the CPU supports.
    pub fn detect() -> Self {
        Self::from_config(&HashConfig::auto())
    }

    /// Build the engine requested by `config`. A forced strategy the CPU does
    /// not support falls back to detection.
    pub fn from_config(config: &HashConfig) -> Self {
        let cpu = CpuFeatures::probe();
        let strategy = match config.strategy {
            StrategyPreference::Force(strategy) if cpu.supports(strategy) => strategy,
            StrategyPreference::Force(strategy) => {
                warn!(
                    requested = %strategy,
                    fallback = %cpu.best(),
                    "configured SHA-256 implementation unavailable on this CPU"
                );
                cpu.best()
            }
            StrategyPreference::Auto => cpu.best(),
        };
        match Self::for_strategy_on(strategy, &cpu) {
            Ok(engine) => engine,
            Err(err) => panic!("{err}"),
        }
    }

    #[cfg(target_arch = "x86_64")]
    fn build(strategy: Strategy) -> Self {
        use crate::sha256::{shani, x86};

        match strategy {
            Strategy::Standard => Self::standard(),
            Strategy::Sse4 => Sha256Engine {
                strategy,
                transform_fn: x86::transform_sse4,
                d64: x86::double_sha256_64_sse4,
                d64_2way: None,
                d64_4way: Some(x86::double_sha256_64_4way),
                d64_8way: None,
                description: "sse4(1way),sse41(4way)",
            },
            Strategy::Avx2 => Sha256Engine {
                strategy,
                transform_fn: x86::transform_sse4,
                d64: x86::double_sha256_64_sse4,
                d64_2way: None,
                d64_4way: Some(x86::double_sha256_64_4way),
                d64_8way: Some(x86::double_sha256_64_8way),
                description: "sse4(1way),sse41(4way),avx2(8way)",
            },
            Strategy::ShaNi => Sha256Engine {
                strategy,
                transform_fn: shani::transform,
                d64: shani::double_sha256_64,
                d64_2way: Some(shani::double_sha256_64_2way),
                d64_4way: None,
                d64_8way: None,
                description: "shani(1way,2way)",
            },
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn build(_strategy: Strategy) -> Self {
        Self::standard()
    }

    /// Run the known-answer test against every routine of this engine.
    pub fn self_test(&self) -> Result<(), HashError> {
        selftest::check(self).map_err(HashError::SelfTestFailed)?;
        debug!(
            implementation = self.description,
            two_way = self.d64_2way.is_some(),
            four_way = self.d64_4way.is_some(),
            eight_way = self.d64_8way.is_some(),
            "SHA-256 self-test passed"
        );
        Ok(())
    }

    /// The strategy this engine was built for.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Human-readable list of the installed transforms, e.g.
    /// `"sse4(1way),sse41(4way),avx2(8way)"`.
    pub fn describe(&self) -> &'static str {
        self.description
    }

    /// Advance `state` over every whole 64-byte block of `blocks`.
    #[inline]
    pub fn transform(&self, state: &mut [u32; 8], blocks: &[u8]) {
        (self.transform_fn)(state, blocks)
    }

    /// Widest batch width available.
    pub fn max_batch(&self) -> usize {
        [(self.d64_8way, 8), (self.d64_4way, 4), (self.d64_2way, 2)]
            .into_iter()
            .find_map(|(routine, width)| routine.map(|_| width))
            .unwrap_or(1)
    }

    /// Double-SHA-256 each 64-byte block of `input` into consecutive 32-byte
    /// digests in `out`, consuming blocks 8, then 4, then 2, then 1 at a time
    /// with whichever batch widths this engine has.
    ///
    /// # Panics
    /// If `input` is not a whole number of blocks or `out` is too short.
    pub fn double_sha256_64(&self, out: &mut [u8], input: &[u8]) {
        assert!(
            input.len() % 64 == 0,
            "sha256d64 input must be a multiple of 64 bytes, got {}",
            input.len()
        );
        let blocks = input.len() / 64;
        assert!(
            out.len() >= 32 * blocks,
            "sha256d64 output needs {} bytes, got {}",
            32 * blocks,
            out.len()
        );

        let widths = [
            (self.d64_8way, 8),
            (self.d64_4way, 4),
            (self.d64_2way, 2),
            (Some(self.d64), 1),
        ];
        let mut done = 0;
        for (routine, width) in widths {
            let Some(routine) = routine else { continue };
            while blocks - done >= width {
                routine(
                    &mut out[32 * done..32 * (done + width)],
                    &input[64 * done..64 * (done + width)],
                );
                done += width;
            }
        }
    }
}

impl fmt::Debug for Sha256Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sha256Engine")
            .field("strategy", &self.strategy)
            .field("description", &self.description)
            .finish()
    }
}

static ENGINE: OnceLock<Sha256Engine> = OnceLock::new();

/// Install the engine described by `config` unless one is already installed,
/// and return the installed engine.
pub fn init_sha256_engine(config: &HashConfig) -> &'static Sha256Engine {
    let mut fresh = false;
    let engine = ENGINE.get_or_init(|| {
        fresh = true;
        Sha256Engine::from_config(config)
    });
    if fresh {
        info!(implementation = engine.describe(), "using SHA-256 implementation");
    } else if let StrategyPreference::Force(requested) = config.strategy {
        if requested != engine.strategy() {
            warn!(
                requested = %requested,
                installed = engine.describe(),
                "SHA-256 engine already installed, ignoring configuration"
            );
        }
    }
    engine
}

/// The process-wide engine, installed on first call from
/// `CHYMERA_SHA256_IMPL` (or detection when the variable is unset or
/// invalid).
pub fn sha256_engine() -> &'static Sha256Engine {
    if let Some(engine) = ENGINE.get() {
        return engine;
    }
    let config = HashConfig::from_env().unwrap_or_else(|err| {
        warn!(error = %err, "ignoring {}", HashConfig::ENV_VAR);
        HashConfig::auto()
    });
    init_sha256_engine(&config)
}

/// Select and self-test the SHA-256 implementation, returning its
/// description.
pub fn sha256_autodetect() -> &'static str {
    sha256_engine().describe()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_features() -> CpuFeatures {
        CpuFeatures {
            sse41: true,
            avx: true,
            avx2: true,
            shani: true,
        }
    }

    #[test]
    fn test_strategy_names_round_trip() {
        for strategy in Strategy::ALL {
            assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
        }
        assert!("SSE4".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_best_strategy_order() {
        let mut cpu = all_features();
        assert_eq!(cpu.best(), Strategy::ShaNi);
        cpu.shani = false;
        assert_eq!(cpu.best(), Strategy::Avx2);
        cpu.avx = false;
        assert_eq!(cpu.best(), Strategy::Sse4);
        cpu.sse41 = false;
        assert_eq!(cpu.best(), Strategy::Standard);
    }

    #[test]
    fn test_shani_requires_sse41() {
        let cpu = CpuFeatures {
            shani: true,
            ..CpuFeatures::default()
        };
        assert!(!cpu.supports(Strategy::ShaNi));
        assert_eq!(cpu.best(), Strategy::Standard);
    }

    #[test]
    fn test_unsupported_strategy_is_an_error() {
        let err = Sha256Engine::for_strategy_on(Strategy::Avx2, &CpuFeatures::default())
            .unwrap_err();
        assert!(matches!(err, HashError::Unsupported(Strategy::Avx2)));
    }

    #[test]
    fn test_standard_engine_shape() {
        let engine = Sha256Engine::standard();
        assert_eq!(engine.describe(), "standard");
        assert_eq!(engine.max_batch(), 1);
        assert!(engine.self_test().is_ok());
    }

    #[test]
    fn test_supported_strategies_describe_themselves() {
        let cpu = CpuFeatures::probe();
        for strategy in Strategy::ALL.into_iter().filter(|s| cpu.supports(*s)) {
            let engine = Sha256Engine::for_strategy(strategy).unwrap();
            let expected = match strategy {
                Strategy::Standard => "standard",
                Strategy::Sse4 => "sse4(1way),sse41(4way)",
                Strategy::Avx2 => "sse4(1way),sse41(4way),avx2(8way)",
                Strategy::ShaNi => "shani(1way,2way)",
            };
            assert_eq!(engine.describe(), expected);
        }
    }

    #[test]
    fn test_double_sha256_64_uneven_block_count() {
        // Seven blocks exercise every width below eight on batch engines.
        let input: Vec<u8> = (0..7 * 64).map(|i| (i * 7 + 3) as u8).collect();
        let mut expected = vec![0u8; 7 * 32];
        Sha256Engine::standard().double_sha256_64(&mut expected, &input);

        let cpu = CpuFeatures::probe();
        for strategy in Strategy::ALL.into_iter().filter(|s| cpu.supports(*s)) {
            let engine = Sha256Engine::for_strategy(strategy).unwrap();
            let mut out = vec![0u8; 7 * 32];
            engine.double_sha256_64(&mut out, &input);
            assert_eq!(out, expected, "{strategy}");
        }
    }

    #[test]
    #[should_panic(expected = "multiple of 64")]
    fn test_double_sha256_64_rejects_partial_block() {
        let mut out = [0u8; 32];
        Sha256Engine::standard().double_sha256_64(&mut out, &[0u8; 65]);
    }

    #[test]
    fn test_global_engine_is_stable() {
        let first = sha256_engine() as *const Sha256Engine;
        let second = sha256_engine() as *const Sha256Engine;
        assert_eq!(first, second);
        assert_eq!(sha256_autodetect(), sha256_engine().describe());
    }
}
