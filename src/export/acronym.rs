/// Returned when neither a name nor a symbol is known
pub const UNKNOWN_ACRONYM: &str = "UNKN";

const STOPWORDS: [&str; 6] = ["the", "a", "an", "of", "and", "or"];

/// Short label for a token, used in wallet-tracker names and export filenames.
///
/// "Dogecoin Super Mega Moon Edition" → "DSMME", "Wrapped SOL" → "WS",
/// "AI" → "AI". Single-word names prefer a short symbol, else the first five
/// characters of the name.
pub fn acronym(name: &str, symbol: Option<&str>) -> String {
    let symbol = symbol.filter(|s| !s.is_empty());
    let name = name.trim();

    if name.is_empty() || name == "Unknown" {
        return symbol
            .map(str::to_uppercase)
            .unwrap_or_else(|| UNKNOWN_ACRONYM.to_string());
    }

    if name.chars().count() <= 4 {
        return name.to_uppercase();
    }

    let words: Vec<&str> = name
        .split(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | '.'))
        .filter(|w| !w.is_empty())
        .filter(|w| !STOPWORDS.contains(&w.to_lowercase().as_str()))
        .collect();

    if words.len() > 1 {
        return words
            .iter()
            .filter_map(|w| w.chars().next())
            .flat_map(char::to_uppercase)
            .collect();
    }

    match symbol {
        Some(s) if s.chars().count() <= 5 => s.to_uppercase(),
        _ => name.chars().take(5).collect::<String>().to_uppercase(),
    }
}
