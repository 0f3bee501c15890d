//! `--expect` argument parsing.

use upgrade_pipeline::IncarnationCheck;

/// Parse `NAME=N` (exact incarnation) or `NAME=+1` (one more than before).
pub fn parse_check(raw: &str) -> Result<IncarnationCheck, String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=N or NAME=+1, got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing vat name in {raw:?}"));
    }

    match value.trim() {
        "+1" => Ok(IncarnationCheck::advanced(name)),
        n if n.starts_with('+') => Err(format!("only +1 is supported, got {n:?}")),
        n => n
            .parse::<u64>()
            .map(|n| IncarnationCheck::exact(name, n))
            .map_err(|e| format!("bad incarnation {n:?}: {e}")),
    }
}
