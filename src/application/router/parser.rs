//! Command text splitting

/// Split a command remainder on the first whitespace run into a verb and
/// the argument tail.
pub fn split_verb(cmd: &str) -> (&str, &str) {
    let cmd = cmd.trim();
    match cmd.split_once(char::is_whitespace) {
        Some((verb, tail)) => (verb, tail.trim_start()),
        None => (cmd, ""),
    }
}

/// Split `text` into at most `n` whitespace separated fields. The last
/// field keeps the remainder of the text, inner spacing included.
pub fn split_fields(text: &str, n: usize) -> Vec<&str> {
    let mut fields = Vec::with_capacity(n);
    let mut rest = text.trim();
    while !rest.is_empty() && fields.len() + 1 < n {
        match rest.split_once(char::is_whitespace) {
            Some((head, tail)) => {
                fields.push(head);
                rest = tail.trim_start();
            }
            None => {
                fields.push(rest);
                rest = "";
            }
        }
    }
    if !rest.is_empty() && n > 0 {
        fields.push(rest);
    }
    fields
}
