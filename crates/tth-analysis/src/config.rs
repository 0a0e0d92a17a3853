//! Line-based analysis configuration.
//!
//! The format is a flat `Key: value` list (`=` is accepted as separator).
//! `#` and `//` start comments outside quotes and keys are case-insensitive.
//! A `Selection: <name>` line opens a selection block; the selection
//! attributes that follow belong to it until the next block. Global keys may
//! appear anywhere.
//!
//! ```text
//! Debug: false
//! BTagWP: -0.4434
//! BTagBranch: jet_mv2c20
//! Trigger: HLT_mu50, HLT_e60_lhmedium
//! XSFile: XS_Samples.txt
//!
//! Selection: sel_mu_4j_2b
//!   DisplayName: "1 Muon, >= 4 jets, >= 2 b-jets"
//!   ElNum: 0
//!   MuNum: 1
//!   JetNum: 4
//!   JetEquality: false
//!   BJetNum: 2
//!   BJetEquality: false
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use tth_core::{CountCut, DEFAULT_BTAG_WP, Error, Result, Selection};
use tth_hist::SlotCaps;

/// Where the total generated event count of a simulated file comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NormSource {
    /// Sum of the per-lumi-block `totalEventsWeighted` table.
    SumWeights,
    /// One bin of the pre-computed cutflow histogram.
    Cutflow,
}

/// Resolved analysis configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisConfig {
    /// Verbose tracing.
    pub debug: bool,
    /// b-tagging working point.
    pub btag_wp: f64,
    /// Jagged column holding the jet b-tag discriminant.
    pub btag_branch: String,
    /// Trigger names; an event passes if any of them fired. Empty passes all.
    pub triggers: Vec<String>,
    /// Cross-section table.
    pub xs_file: Option<PathBuf>,
    /// Source of the total generated event count.
    pub norm_source: NormSource,
    /// 0-based cutflow bin used with [`NormSource::Cutflow`].
    pub cutflow_bin: usize,
    /// Per-slot histogram caps.
    pub slot_caps: SlotCaps,
    /// File base-name marker for real data (followed by a digit, e.g. `data15`).
    pub data_pattern: String,
    /// Selection catalog, in evaluation and output order.
    pub selections: Vec<Selection>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            debug: false,
            btag_wp: DEFAULT_BTAG_WP,
            btag_branch: "jet_mv2c20".into(),
            triggers: Vec::new(),
            xs_file: None,
            norm_source: NormSource::SumWeights,
            cutflow_bin: 0,
            slot_caps: SlotCaps::default(),
            data_pattern: "data".into(),
            selections: default_catalog(),
        }
    }
}

/// The single-lepton ≥4-jet categories of the ttH(bb) analysis.
pub fn default_catalog() -> Vec<Selection> {
    let mut out = Vec::new();
    for (flavour, label, n_el, n_mu) in [("mu", "1 Muon", 0, 1), ("el", "1 Electron", 1, 0)] {
        for n_b in 2..=4 {
            out.push(
                Selection::new(format!("sel_{flavour}_4j_{n_b}b"))
                    .display_name(format!("{label}, >= 4 jets, >= {n_b} b-jets"))
                    .electrons(n_el)
                    .muons(n_mu)
                    .jets(CountCut::AtLeast(4))
                    .bjets(CountCut::AtLeast(n_b)),
            );
        }
    }
    out
}

impl AnalysisConfig {
    /// Read and parse a config file. Relative paths inside resolve against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("{}: {e}", path.display())))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        log::info!("configuring from {}", path.display());
        Self::parse_str(&text, base_dir)
    }

    /// Parse config text.
    pub fn parse_str(text: &str, base_dir: &Path) -> Result<Self> {
        let mut cfg = AnalysisConfig::default();
        let mut blocks: Vec<SelectionBlock> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = split_kv(line) else {
                continue;
            };
            let at = |msg: String| Error::ConfigLoad(format!("line {line_no}: {msg}"));

            if key_eq(&key, "Selection") {
                let name = unquote(&value);
                if name.is_empty() {
                    return Err(at("selection block without a name".into()));
                }
                blocks.push(SelectionBlock::new(name));
                continue;
            }

            if cfg.apply_global(&key, &value, base_dir).map_err(at)? {
                continue;
            }

            match blocks.last_mut() {
                Some(block) => {
                    if !block.apply(&key, &value).map_err(at)? {
                        log::warn!("line {line_no}: ignoring unknown selection key '{key}'");
                    }
                }
                None => log::warn!("line {line_no}: ignoring unknown key '{key}'"),
            }
        }

        if !blocks.is_empty() {
            cfg.selections = blocks.into_iter().map(SelectionBlock::build).collect();
        }
        for (i, s) in cfg.selections.iter().enumerate() {
            if cfg.selections[..i].iter().any(|o| o.name == s.name) {
                return Err(Error::ConfigLoad(format!("duplicate selection '{}'", s.name)));
            }
        }
        Ok(cfg)
    }

    /// Whether any selection depends on the data-taking year.
    pub fn uses_eras(&self) -> bool {
        self.selections.iter().any(Selection::uses_eras)
    }

    /// Tagger name used for the discriminant histograms: `BTagBranch` without its `jet_` prefix.
    pub fn discriminant_name(&self) -> &str {
        self.btag_branch.strip_prefix("jet_").unwrap_or(&self.btag_branch)
    }

    /// Apply a global key. Returns `Ok(false)` if `key` is not a global key.
    fn apply_global(
        &mut self,
        key: &str,
        value: &str,
        base_dir: &Path,
    ) -> std::result::Result<bool, String> {
        let k = key.to_ascii_lowercase();
        match k.as_str() {
            "debug" => self.debug = parse_bool(value)?,
            "btagwp" => self.btag_wp = parse_f64(value)?,
            "btagbranch" => self.btag_branch = unquote(value),
            "trigger" => self.triggers = parse_list(value),
            "xsfile" => {
                let p = PathBuf::from(unquote(value));
                self.xs_file = Some(if p.is_absolute() { p } else { base_dir.join(p) });
            }
            "normsource" => {
                self.norm_source = match value.trim().to_ascii_lowercase().as_str() {
                    "sumweights" => NormSource::SumWeights,
                    "cutflow" => NormSource::Cutflow,
                    other => return Err(format!("unknown NormSource '{other}'")),
                }
            }
            "cutflowbin" => self.cutflow_bin = parse_usize(value)?,
            "numhistelectrons" => self.slot_caps.electrons = parse_usize(value)?,
            "numhistmuons" => self.slot_caps.muons = parse_usize(value)?,
            "numhistjets" => self.slot_caps.jets = parse_usize(value)?,
            "datapattern" => self.data_pattern = unquote(value),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[derive(Debug)]
struct SelectionBlock {
    selection: Selection,
    jet_num: Option<usize>,
    jet_equality: bool,
    bjet_num: Option<usize>,
    bjet_equality: bool,
}

impl SelectionBlock {
    fn new(name: String) -> Self {
        Self {
            selection: Selection::new(name),
            jet_num: None,
            jet_equality: true,
            bjet_num: None,
            bjet_equality: true,
        }
    }

    fn apply(&mut self, key: &str, value: &str) -> std::result::Result<bool, String> {
        let s = &mut self.selection;
        match key.to_ascii_lowercase().as_str() {
            "displayname" => s.display_name = unquote(value),
            "elnum" => s.electrons = parse_count(value)?,
            "munum" => s.muons = parse_count(value)?,
            "lepnum" => s.leptons = parse_count(value)?,
            "jetnum" => self.jet_num = parse_count(value)?,
            "jetequality" => self.jet_equality = parse_bool(value)?,
            "bjetnum" => self.bjet_num = parse_count(value)?,
            "bjetequality" => self.bjet_equality = parse_bool(value)?,
            "eras" => {
                s.eras = parse_list(value)
                    .iter()
                    .map(|y| y.parse::<u16>().map_err(|_| format!("invalid era: {y:?}")))
                    .collect::<std::result::Result<_, _>>()?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn build(self) -> Selection {
        let mut s = self.selection;
        s.jets = self.jet_num.map(|n| CountCut::new(n, self.jet_equality));
        s.bjets = self.bjet_num.map(|n| CountCut::new(n, self.bjet_equality));
        s
    }
}

fn strip_comment(line: &str) -> &str {
    // Quote-aware so values like "w#1" keep the '#'.
    let mut in_single = false;
    let mut in_double = false;
    let bytes = line.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if in_single || in_double {
            if in_single && c == '\'' {
                in_single = false;
            } else if in_double && c == '"' {
                in_double = false;
            }
            i += 1;
            continue;
        }
        match c {
            '\'' => in_single = true,
            '"' => in_double = true,
            '#' => return &line[..i],
            '/' if bytes.get(i + 1) == Some(&b'/') => return &line[..i],
            _ => {}
        }
        i += 1;
    }
    line
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    let is_quoted = s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')));
    if is_quoted { s[1..s.len() - 1].to_string() } else { s.to_string() }
}

fn split_kv(line: &str) -> Option<(String, String)> {
    // Split on the first ':' or '=' outside quotes. Bare keys are flags.
    let mut in_single = false;
    let mut in_double = false;
    let mut sep_idx: Option<usize> = None;
    for (i, c) in line.char_indices() {
        if in_single || in_double {
            if in_single && c == '\'' {
                in_single = false;
            } else if in_double && c == '"' {
                in_double = false;
            }
            continue;
        }
        match c {
            '\'' => in_single = true,
            '"' => in_double = true,
            ':' | '=' => {
                sep_idx = Some(i);
                break;
            }
            _ => {}
        }
    }

    let (key, value) = match sep_idx {
        Some(idx) => (line[..idx].trim(), line[idx + 1..].trim()),
        None => (line.trim(), ""),
    };
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

fn key_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn parse_list(value: &str) -> Vec<String> {
    // Accept "a,b,c", "a b c" and "[a, b, c]".
    let v = value.trim();
    let inner = v.strip_prefix('[').and_then(|s| s.strip_suffix(']')).unwrap_or(v);
    inner
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(unquote)
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Ok(true),
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(format!("invalid bool: {value:?}")),
    }
}

fn parse_f64(s: &str) -> std::result::Result<f64, String> {
    s.trim().parse::<f64>().map_err(|_| format!("invalid float: {s:?}"))
}

fn parse_usize(s: &str) -> std::result::Result<usize, String> {
    s.trim().parse::<usize>().map_err(|_| format!("invalid non-negative integer: {s:?}"))
}

/// `-1` (or any negative sentinel written as `-1`) means unconstrained.
fn parse_count(s: &str) -> std::result::Result<Option<usize>, String> {
    match s.trim().parse::<i64>() {
        Ok(-1) => Ok(None),
        Ok(n) if n >= 0 => Ok(Some(n as usize)),
        _ => Err(format!("invalid count {s:?} (expected >= 0, or -1 for unconstrained)")),
    }
}
