//! Reified session state (§9 design note: "Global state... is to be
//! reified as an explicit Session value").
//!
//! Every module-level global of the original (`cache`, `hv_cache`,
//! `ecache`, `sigma`, `delta`, `mask`) lives here instead, threaded
//! explicitly through `para_match`/`h_v`/`h_p`/`h_r` rather than read off
//! process globals.

use crate::graph::Uri;
use crate::paths::GeneratedPath;
use rand::Rng;
use std::collections::HashMap;

/// Selects which [`crate::backend::Backend`] a networked session speaks
/// (§6 "`security_mode` boolean"): `Encrypted` drives
/// `driver::run_encrypted_session` over the masked oracle protocol;
/// `Plaintext` drives `driver::run_networked_plaintext_session`, the §4.7
/// mirror variant carried over the same wire taxonomy with `EncVector`
/// replaced by plain normalized vectors and no masking. `clap::ValueEnum`
/// lets it be parsed directly off `--security-mode` in the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SecurityMode {
    Encrypted,
    Plaintext,
}

/// Tunable thresholds, reified from `config.py`'s singleton
/// `ConfigManager`. Defaults match the specification's stated values
/// exactly; `config.py`'s own defaults (`sigma=0.85`, `theta=2.4`) are a
/// different, looser configuration the original shipped as a fallback and
/// are not used here — the specification's stated constants take
/// priority (see DESIGN.md).
#[derive(Debug, Clone)]
pub struct Config {
    pub sigma: f64,
    pub delta: f64,
    pub k: usize,
    pub epsilon: f64,
    pub host: String,
    pub port: u16,
    pub security_mode: SecurityMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sigma: 0.95,
            delta: 0.2,
            k: 3,
            epsilon: 0.01,
            host: "127.0.0.1".to_string(),
            port: 65432,
            security_mode: SecurityMode::Encrypted,
        }
    }
}

impl Config {
    /// The oracle's decryption-server listening port, always `port + 10`
    /// (`client.py`'s `start_decryption_server`).
    pub fn oracle_port(&self) -> u16 {
        self.port + 10
    }
}

/// Draws the session mask from the open interval `(lb, ub)` by rejection
/// sampling, matching `util.py`'s `get_random_mask`. `inclusive = false`
/// matters here: a mask that lands exactly on `1.0` would let the oracle
/// recover the true difference, defeating the point of masking.
pub fn random_mask(lb: f64, ub: f64, inclusive: bool) -> f64 {
    let mut rng = rand::thread_rng();
    loop {
        let candidate = rng.gen_range(lb..=ub);
        let acceptable = if inclusive {
            candidate >= lb && candidate <= ub
        } else {
            candidate > lb && candidate < ub
        };
        if acceptable {
            return candidate;
        }
    }
}

/// `(server_uri, client_uri) -> (matched, witnesses)`, reset at the start
/// of each outer server-vertex iteration by the driver.
pub type MatchCache = HashMap<(Uri, Uri), (bool, Vec<(Uri, Uri)>)>;

/// Session-lifetime state threaded through similarity, path generation,
/// and matching.
pub struct Session {
    pub config: Config,
    /// The session's own masking factor for `h_v`/`h_p` (§4.3). Held
    /// separately from the oracle's independent `h_p` blinding factor,
    /// which is redrawn per call on the oracle side.
    pub mask: f64,
    /// `(server_uri, client_uri) -> similarity verdict`, session-lifetime.
    pub hv_cache: HashMap<(Uri, Uri), bool>,
    /// `vertex_uri -> h_r result`, session-lifetime.
    pub ecache: HashMap<Uri, Vec<GeneratedPath>>,
    /// Reset per outer server-vertex iteration.
    pub cache: MatchCache,
}

impl Session {
    pub fn new(config: Config) -> Self {
        let mask = random_mask(1.0, 2.0, false);
        Self {
            config,
            mask,
            hv_cache: HashMap::new(),
            ecache: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    /// Resets `cache` (and implicitly discards stale witness lists) at
    /// the start of each outer server-vertex iteration, per §4.5.
    pub fn reset_match_cache(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_mask_stays_strictly_inside_open_interval() {
        for _ in 0..1000 {
            let m = random_mask(1.0, 2.0, false);
            assert!(m > 1.0 && m < 2.0);
        }
    }

    #[test]
    fn oracle_port_is_primary_port_plus_ten() {
        let mut config = Config::default();
        config.port = 65432;
        assert_eq!(config.oracle_port(), 65442);
    }
}
