use super::config::PlatformChoice;
use super::error::EngineError;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    /// Force kernels split across a dedicated rayon pool.
    Parallel,
    /// Single-threaded kernels on the calling thread.
    Reference,
}

impl PlatformKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Reference => "reference",
        }
    }
}

/// An acquired execution context. Dropping it releases the worker threads.
pub struct Platform {
    kind: PlatformKind,
    pool: Option<ThreadPool>,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("kind", &self.kind)
            .field("threads", &self.threads())
            .finish()
    }
}

impl Platform {
    pub fn reference() -> Self {
        Self {
            kind: PlatformKind::Reference,
            pool: None,
        }
    }

    pub fn kind(&self) -> PlatformKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn threads(&self) -> usize {
        self.pool.as_ref().map_or(1, ThreadPool::current_num_threads)
    }

    /// Whether kernels should take their parallel code path.
    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Runs `op` inside this platform's thread pool, or inline on the reference platform.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

/// Something that can hand out a [`Platform`], or explain why it cannot.
pub trait PlatformProvider {
    fn name(&self) -> &'static str;
    fn acquire(&self) -> Result<Platform, EngineError>;
}

#[derive(Debug, Clone, Default)]
pub struct ParallelProvider {
    /// Worker count; `None` lets rayon pick one per logical core.
    pub threads: Option<usize>,
}

impl PlatformProvider for ParallelProvider {
    fn name(&self) -> &'static str {
        PlatformKind::Parallel.name()
    }

    fn acquire(&self) -> Result<Platform, EngineError> {
        let unavailable = |reason: String| EngineError::Platform {
            name: PlatformKind::Parallel.name(),
            reason,
        };
        if self.threads == Some(0) {
            return Err(unavailable("requested zero worker threads".to_string()));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.threads.unwrap_or(0))
            .thread_name(|index| format!("hydromd-worker-{}", index))
            .build()
            .map_err(|e| unavailable(e.to_string()))?;
        Ok(Platform {
            kind: PlatformKind::Parallel,
            pool: Some(pool),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceProvider;

impl PlatformProvider for ReferenceProvider {
    fn name(&self) -> &'static str {
        PlatformKind::Reference.name()
    }

    fn acquire(&self) -> Result<Platform, EngineError> {
        Ok(Platform::reference())
    }
}

/// Providers to try, in order, for a configured platform choice.
pub fn providers_for(choice: PlatformChoice, threads: Option<usize>) -> Vec<Box<dyn PlatformProvider>> {
    match choice {
        PlatformChoice::Auto => vec![
            Box::new(ParallelProvider { threads }),
            Box::new(ReferenceProvider),
        ],
        PlatformChoice::Parallel => vec![Box::new(ParallelProvider { threads })],
        PlatformChoice::Reference => vec![Box::new(ReferenceProvider)],
    }
}

/// Returns the first platform that can be acquired, warning about every provider that fails.
pub fn select_platform(providers: &[Box<dyn PlatformProvider>]) -> Result<Platform, EngineError> {
    for provider in providers {
        match provider.acquire() {
            Ok(platform) => {
                info!(
                    platform = platform.name(),
                    threads = platform.threads(),
                    "Acquired execution platform"
                );
                return Ok(platform);
            }
            Err(e) => {
                warn!(platform = provider.name(), "Platform unavailable, falling back: {}", e);
            }
        }
    }
    Err(EngineError::NoPlatform {
        tried: providers
            .iter()
            .map(|p| p.name())
            .collect::<Vec<_>>()
            .join(", "),
    })
}
