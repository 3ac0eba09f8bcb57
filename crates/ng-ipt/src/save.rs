use ng_core::{Counters, NO_SUCH_CHAIN, Policy, SourceError, TableSource};
use regex::Regex;
use std::sync::LazyLock;

// :INPUT ACCEPT [120:9600]
static CHAIN_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^:(\S+)\s+(\S+)(?:\s+\[(\d+):(\d+)\])?\s*$").expect("chain declaration regex")
});

// [5:300] -A INPUT ...
static RULE_COUNTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\d+:\d+\]\s+(.*)$").expect("rule counter regex"));

/// One `-A` line, reduced to its jump or goto target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedRule {
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedChain {
    pub name: String,
    pub policy: Option<Policy>,
    pub rules: Vec<SavedRule>,
}

/// A parsed `iptables-save` section for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSnapshot {
    chains: Vec<SavedChain>,
}

impl TableSnapshot {
    /// Parse the section for `table` out of `iptables-save` output
    pub fn parse(table: &str, output: &str) -> Result<Self, SourceError> {
        let mut chains: Vec<SavedChain> = Vec::new();
        let mut in_section = false;
        let mut seen_section = false;

        for (index, raw) in output.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('*') {
                in_section = name == table;
                seen_section |= in_section;
                continue;
            }

            if !in_section {
                continue;
            }

            if line == "COMMIT" {
                in_section = false;
                continue;
            }

            if line.starts_with(':') {
                let chain = parse_chain_decl(line)
                    .ok_or_else(|| malformed(line_no, "bad chain declaration"))?;
                if chains.iter().any(|c| c.name == chain.name) {
                    return Err(malformed(line_no, "duplicate chain declaration"));
                }
                chains.push(chain);
                continue;
            }

            let (chain, rule) = parse_rule(line).ok_or_else(|| malformed(line_no, "unexpected line"))?;
            let owner = chains
                .iter_mut()
                .find(|c| c.name == chain)
                .ok_or_else(|| malformed(line_no, "rule for undeclared chain"))?;
            owner.rules.push(rule);
        }

        if !seen_section {
            return Err(SourceError::Other(format!(
                "table '{}' missing from iptables-save output",
                table
            )));
        }

        Ok(Self { chains })
    }

    fn chain(&self, name: &str) -> Result<&SavedChain, SourceError> {
        self.chains
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| SourceError::Other(NO_SUCH_CHAIN.to_string()))
    }
}

impl TableSource for TableSnapshot {
    type Rule = SavedRule;

    fn chains(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.chains.iter().map(|c| c.name.clone()).collect())
    }

    fn policy(&self, chain: &str) -> Option<Policy> {
        self.chain(chain).ok().and_then(|c| c.policy.clone())
    }

    fn references(&self, chain: &str) -> Result<u32, SourceError> {
        self.chain(chain)?;
        let count = self
            .chains
            .iter()
            .flat_map(|c| c.rules.iter())
            .filter(|r| r.target.as_deref() == Some(chain))
            .count();
        u32::try_from(count).map_err(|_| SourceError::Other("reference count overflow".to_string()))
    }

    fn rules(&self, chain: &str) -> Result<Vec<SavedRule>, SourceError> {
        Ok(self.chain(chain)?.rules.clone())
    }
}

fn malformed(line: usize, what: &str) -> SourceError {
    SourceError::Other(format!("malformed iptables-save output at line {}: {}", line, what))
}

fn parse_chain_decl(line: &str) -> Option<SavedChain> {
    let caps = CHAIN_DECL.captures(line)?;
    let name = caps[1].to_string();

    let policy = match &caps[2] {
        "-" => None,
        target => {
            let counters = match (caps.get(3), caps.get(4)) {
                (Some(p), Some(b)) => Counters {
                    packets: p.as_str().parse().ok()?,
                    bytes: b.as_str().parse().ok()?,
                },
                _ => Counters::default(),
            };
            Some(Policy {
                target: target.to_string(),
                counters,
            })
        }
    };

    Some(SavedChain {
        name,
        policy,
        rules: Vec::new(),
    })
}

fn parse_rule(line: &str) -> Option<(String, SavedRule)> {
    let spec = RULE_COUNTERS
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map_or(line, |m| m.as_str());

    let tokens = tokenize(spec);
    if tokens.first().map(String::as_str) != Some("-A") {
        return None;
    }
    let chain = tokens.get(1)?.clone();

    let target = tokens
        .windows(2)
        .find(|pair| matches!(pair[0].as_str(), "-j" | "--jump" | "-g" | "--goto"))
        .map(|pair| pair[1].clone());

    Some((chain, SavedRule { target }))
}

/// Split a rule on whitespace, keeping double-quoted arguments whole
fn tokenize(spec: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut started = false;
    let mut chars = spec.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' if quoted => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '"' => {
                quoted = !quoted;
                started = true;
            }
            c if c.is_whitespace() && !quoted => {
                if started {
                    tokens.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if started {
        tokens.push(current);
    }

    tokens
}
