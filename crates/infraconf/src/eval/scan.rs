//! `${...}` span scanner
//!
//! A span opens at `${` and closes at the `}` that brings the brace depth back to zero.
//! Braces inside quoted strings do not count, except where a quoted string itself opens a
//! nested `${` or `%{` sequence. An opening marker without a matching close is an error.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    /// Inner text of a `${...}` span, markers excluded
    Interpolation(&'a str),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unterminated `${{` at offset {offset}")]
pub struct Unterminated {
    pub offset: usize,
}

#[derive(Clone, Copy)]
enum Frame {
    Brace,
    Quoted,
}

/// Byte index of the `}` closing the span whose `${` starts at `open`
pub fn span_end(input: &str, open: usize) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut stack = vec![Frame::Brace];
    let mut index = open + 2;

    while index < bytes.len() {
        let byte = bytes[index];
        match stack.last().copied() {
            Some(Frame::Brace) => match byte {
                b'"' => stack.push(Frame::Quoted),
                b'{' => stack.push(Frame::Brace),
                b'}' => {
                    stack.pop();
                    if stack.is_empty() {
                        return Some(index);
                    }
                }
                _ => {}
            },
            Some(Frame::Quoted) => match byte {
                b'\\' => index += 1,
                b'"' => {
                    stack.pop();
                }
                b'$' | b'%' if bytes.get(index + 1) == Some(&b'{') => {
                    stack.push(Frame::Brace);
                    index += 1;
                }
                _ => {}
            },
            None => return None,
        }
        index += 1;
    }

    None
}

/// Splits `input` into literal text and interpolation spans
pub fn segments(input: &str) -> Result<Vec<Segment<'_>>, Unterminated> {
    let mut segments = Vec::new();
    let mut rest_start = 0;

    while let Some(relative) = input[rest_start..].find("${") {
        let open = rest_start + relative;
        let close = span_end(input, open).ok_or(Unterminated { offset: open })?;

        if open > rest_start {
            segments.push(Segment::Literal(&input[rest_start..open]));
        }
        segments.push(Segment::Interpolation(&input[open + 2..close]));
        rest_start = close + 1;
    }

    if rest_start < input.len() {
        segments.push(Segment::Literal(&input[rest_start..]));
    }

    Ok(segments)
}

pub fn has_interpolation(input: &str) -> bool {
    input.contains("${")
}
