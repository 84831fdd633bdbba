pub mod cpu;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use cpu::CpuBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
