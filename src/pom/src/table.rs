//! Textual form of the descriptor table: one row per line, space-separated integers.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("line {line}: `{token}` is not an integer")]
    BadToken { line: usize, token: String },
}

pub fn parse(text: &str) -> Result<Vec<Vec<i64>>, TableError> {
    let mut rows = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|tok| {
                tok.parse::<i64>().map_err(|_| TableError::BadToken {
                    line: idx + 1,
                    token: tok.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }
    Ok(rows)
}

pub fn format(rows: &[Vec<i64>]) -> String {
    let mut out = String::new();
    for row in rows {
        let line: Vec<String> = row.iter().map(ToString::to_string).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}
