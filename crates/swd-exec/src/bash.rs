//! Shell-argument escaping for building `find`-style commands against
//! artifact exclude patterns.

/// Characters that can appear unescaped inside a bash double-quoted-free
/// word without changing its meaning.
fn dangerous(c: char) -> bool {
    !(c.is_ascii_alphanumeric() || matches!(c, ',' | '.' | '_' | '+' | ':' | '@' | '%' | '/' | '-'))
}

/// Backslash-escape every character outside the safe set, so the result is
/// safe to splice into a bash command line as a single word.
pub fn escape_bash(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if dangerous(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
