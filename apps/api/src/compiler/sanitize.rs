use once_cell::sync::Lazy;
use regex::{Captures, Regex};

// Commands with filesystem, shell, or tokenizer access.
const DENIED: &[&str] = &[
    "immediate",
    "write",
    "openin",
    "openout",
    "read",
    "newread",
    "newwrite",
    "closein",
    "closeout",
    "includeonly",
    "include",
    "input",
    "verbatiminput",
    "lstinputlisting",
    "ShellEscape",
    "directlua",
    "catcode",
    "@@input",
];

// A control word is a backslash and every letter after it, so `\input1.tex`
// is `\input` while `\inputenc` is a different command.
static CONTROL_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(?P<name>(?:@@)?[A-Za-z]+)|\^\^5[cC]")
        .expect("hardcoded control word regex is invalid - fix source code")
});

/// Strips denylisted commands from rendered source. Returns the cleaned text
/// and how many occurrences were removed.
///
/// Runs until nothing more is removed, since deleting one token can join its
/// neighbours into a new command.
pub fn sanitize_source(source: &str) -> (String, usize) {
    let mut text = source.to_string();
    let mut removed = 0;
    loop {
        let mut pass = 0;
        let next = CONTROL_WORD
            .replace_all(&text, |caps: &Captures| match caps.name("name") {
                Some(name) if !DENIED.contains(&name.as_str()) => caps[0].to_string(),
                _ => {
                    pass += 1;
                    String::new()
                }
            })
            .into_owned();
        if pass == 0 {
            return (text, removed);
        }
        text = next;
        removed += pass;
    }
}
