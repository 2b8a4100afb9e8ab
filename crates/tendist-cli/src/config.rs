//! Job description parsed from the input file.
//!
//! Plain-text format, whitespace separated:
//!
//! ```text
//! N
//! I_1 R_1 par_1
//! ...
//! I_N R_N par_N
//! ```
//!
//! `I_k` is the global extent of mode k, `R_k` the target Tucker rank,
//! `par_k` the process-grid factor along that mode. The SPMD group size
//! is `∏ par_k`.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Extent, target rank and grid factor of one tensor mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSpec {
    pub extent: usize,
    pub rank: usize,
    pub par: usize,
}

/// A full decomposition job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    pub modes: Vec<ModeSpec>,
}

impl JobConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading input file {}", path.display()))?;
        Self::from_str_tokens(&text)
    }

    pub fn from_str_tokens(text: &str) -> Result<Self> {
        let mut tokens = text.split_whitespace().map(|t| {
            t.parse::<usize>()
                .with_context(|| format!("input token `{t}` is not a non-negative integer"))
        });
        let mut next = |what: &str| -> Result<usize> {
            tokens
                .next()
                .with_context(|| format!("input ended before {what}"))?
        };

        let n = next("the mode count")?;
        if n == 0 {
            bail!("tensor order must be at least 1");
        }
        let mut modes = Vec::with_capacity(n);
        for k in 0..n {
            let extent = next("a mode extent")?;
            let rank = next("a target rank")?;
            let par = next("a grid factor")?;
            if extent == 0 || par == 0 {
                bail!("mode {k}: extent and grid factor must be positive");
            }
            if rank == 0 || rank > extent {
                bail!("mode {k}: rank {rank} must lie in 1..={extent}");
            }
            modes.push(ModeSpec { extent, rank, par });
        }
        Ok(JobConfig { modes })
    }

    /// Number of SPMD ranks the grid requires.
    pub fn world_size(&self) -> usize {
        self.modes.iter().map(|m| m.par).product()
    }

    pub fn extents(&self) -> Vec<usize> {
        self.modes.iter().map(|m| m.extent).collect()
    }

    pub fn ranks(&self) -> Vec<usize> {
        self.modes.iter().map(|m| m.rank).collect()
    }

    pub fn par(&self) -> Vec<usize> {
        self.modes.iter().map(|m| m.par).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_documented_format() {
        let cfg = JobConfig::from_str_tokens("3\n8 2 2\n8 2 1\n8 2 1\n").unwrap();
        assert_eq!(cfg.modes.len(), 3);
        assert_eq!(cfg.world_size(), 2);
        assert_eq!(cfg.extents(), vec![8, 8, 8]);
        assert_eq!(cfg.ranks(), vec![2, 2, 2]);
        assert_eq!(cfg.par(), vec![2, 1, 1]);
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(JobConfig::from_str_tokens("2\n4 2 1\n").is_err());
    }

    #[test]
    fn rejects_rank_above_extent() {
        assert!(JobConfig::from_str_tokens("1\n4 5 1\n").is_err());
    }

    #[test]
    fn rejects_garbage_tokens() {
        assert!(JobConfig::from_str_tokens("1\n4 two 1\n").is_err());
    }
}
