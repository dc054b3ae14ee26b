use super::{integer, list, next, string, FuncDef, FunctionError, Param, GENERATED_LIMIT};
use crate::value::Value;
use indexmap::IndexMap;
use regex::Regex;

pub(super) fn functions() -> Vec<FuncDef> {
    vec![
        FuncDef::new("chomp", |args, _| {
            let text = string(args.into_iter().next().unwrap_or_default());
            Ok(text.trim_end_matches(['\n', '\r']).into())
        })
        .param(Param::string("str")),
        FuncDef::new("format", |args, _| {
            let mut args = args.into_iter();
            let format_string = string(next(&mut args));
            format(&format_string, &args.collect::<Vec<_>>()).map(Value::String)
        })
        .param(Param::string("format"))
        .variadic(Param::any("args")),
        FuncDef::new("formatlist", |args, _| formatlist(args))
            .param(Param::string("format"))
            .variadic(Param::any("args")),
        FuncDef::new("indent", |args, _| {
            let mut args = args.into_iter();
            let spaces = integer(&next(&mut args), "spaces")?.max(0) as usize;
            if spaces > GENERATED_LIMIT {
                return Err(FunctionError::failed(format!(
                    "cannot indent by more than {GENERATED_LIMIT} spaces"
                )));
            }
            let text = string(next(&mut args));
            let padding = " ".repeat(spaces);
            Ok(text.replace('\n', &format!("\n{padding}")).into())
        })
        .param(Param::number("spaces"))
        .param(Param::string("str")),
        FuncDef::new("join", |args, _| {
            let mut args = args.into_iter();
            let separator = string(next(&mut args));
            let parts: Vec<String> = args.flat_map(list).map(string).collect();
            Ok(parts.join(&separator).into())
        })
        .param(Param::string("separator"))
        .variadic(Param::list("lists")),
        FuncDef::new("lower", |args, _| Ok(string(first(args)).to_lowercase().into()))
            .param(Param::string("str")),
        FuncDef::new("upper", |args, _| Ok(string(first(args)).to_uppercase().into()))
            .param(Param::string("str")),
        FuncDef::new("regex", |args, _| {
            let mut args = args.into_iter();
            let pattern = compile(&string(next(&mut args)))?;
            let text = string(next(&mut args));
            let captures = pattern.captures(&text).ok_or_else(|| {
                FunctionError::failed(format!("pattern did not match `{text}`"))
            })?;
            Ok(captured(&pattern, &captures))
        })
        .param(Param::string("pattern"))
        .param(Param::string("string")),
        FuncDef::new("regexall", |args, _| {
            let mut args = args.into_iter();
            let pattern = compile(&string(next(&mut args)))?;
            let text = string(next(&mut args));
            Ok(Value::Array(
                pattern
                    .captures_iter(&text)
                    .map(|captures| captured(&pattern, &captures))
                    .collect(),
            ))
        })
        .param(Param::string("pattern"))
        .param(Param::string("string")),
        FuncDef::new("replace", |args, _| {
            let mut args = args.into_iter();
            let text = string(next(&mut args));
            let search = string(next(&mut args));
            let replacement = string(next(&mut args));

            match search
                .strip_prefix('/')
                .and_then(|rest| rest.strip_suffix('/'))
            {
                Some(pattern) if search.len() > 1 => Ok(compile(pattern)?
                    .replace_all(&text, replacement.as_str())
                    .into_owned()
                    .into()),
                _ => Ok(text.replace(&search, &replacement).into()),
            }
        })
        .param(Param::string("string"))
        .param(Param::string("substring"))
        .param(Param::string("replacement")),
        FuncDef::new("split", |args, _| {
            let mut args = args.into_iter();
            let separator = string(next(&mut args));
            let text = string(next(&mut args));
            if text.is_empty() {
                return Ok(Value::Array(Vec::new()));
            }
            Ok(Value::Array(
                text.split(separator.as_str()).map(Value::from).collect(),
            ))
        })
        .param(Param::string("separator"))
        .param(Param::string("string")),
        FuncDef::new("strrev", |args, _| {
            Ok(string(first(args)).chars().rev().collect::<String>().into())
        })
        .param(Param::string("string")),
        FuncDef::new("substr", |args, _| {
            let mut args = args.into_iter();
            let text = string(next(&mut args));
            let offset = integer(&next(&mut args), "offset")?;
            let length = integer(&next(&mut args), "length")?;
            substr(&text, offset, length).map(Value::String)
        })
        .param(Param::string("str"))
        .param(Param::number("offset"))
        .param(Param::number("length")),
        FuncDef::new("title", |args, _| Ok(title(&string(first(args))).into()))
            .param(Param::string("str")),
        FuncDef::new("trim", |args, _| {
            let mut args = args.into_iter();
            let text = string(next(&mut args));
            let cutset: Vec<char> = string(next(&mut args)).chars().collect();
            Ok(text.trim_matches(cutset.as_slice()).into())
        })
        .param(Param::string("str"))
        .param(Param::string("cutset")),
        FuncDef::new("trimprefix", |args, _| {
            let mut args = args.into_iter();
            let text = string(next(&mut args));
            let prefix = string(next(&mut args));
            Ok(text.strip_prefix(prefix.as_str()).unwrap_or(&text).into())
        })
        .param(Param::string("str"))
        .param(Param::string("prefix")),
        FuncDef::new("trimsuffix", |args, _| {
            let mut args = args.into_iter();
            let text = string(next(&mut args));
            let suffix = string(next(&mut args));
            Ok(text.strip_suffix(suffix.as_str()).unwrap_or(&text).into())
        })
        .param(Param::string("str"))
        .param(Param::string("suffix")),
        FuncDef::new("trimspace", |args, _| Ok(string(first(args)).trim().into()))
            .param(Param::string("str")),
    ]
}

fn first(args: Vec<Value>) -> Value {
    args.into_iter().next().unwrap_or_default()
}

fn compile(pattern: &str) -> Result<Regex, FunctionError> {
    Regex::new(pattern).map_err(|e| FunctionError::failed(format!("invalid pattern: {e}")))
}

/// Whole match without groups, an object for named groups, a list for positional groups
fn captured(pattern: &Regex, captures: &regex::Captures<'_>) -> Value {
    let text = |index: usize| {
        captures
            .get(index)
            .map_or(Value::Null, |m| Value::from(m.as_str()))
    };

    if captures.len() == 1 {
        return text(0);
    }

    if pattern.capture_names().flatten().next().is_some() {
        let named: IndexMap<String, Value> = pattern
            .capture_names()
            .flatten()
            .map(|name| {
                let value = captures
                    .name(name)
                    .map_or(Value::Null, |m| Value::from(m.as_str()));
                (name.to_string(), value)
            })
            .collect();
        return Value::Object(named);
    }

    Value::Array((1..captures.len()).map(text).collect())
}

fn substr(text: &str, offset: i64, length: i64) -> Result<String, FunctionError> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len() as i64;

    let start = if offset < 0 { len + offset } else { offset };
    if start < 0 || start > len {
        return Err(FunctionError::failed(format!(
            "offset {offset} is out of range for a string of length {len}"
        )));
    }

    let end = if length < 0 {
        len
    } else {
        start.saturating_add(length).min(len)
    };

    Ok(chars[start as usize..end as usize].iter().collect())
}

fn title(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if at_word_start && c.is_alphabetic() {
            output.extend(c.to_uppercase());
        } else {
            output.push(c);
        }
        at_word_start = !c.is_alphanumeric();
    }
    output
}

/// printf-style formatting with the verbs `%s %d %f %t %q %v` and `%%`
///
/// Width (`%5d`), left alignment (`%-5s`), zero padding (`%05d`) and precision (`%.2f`) are
/// supported.
pub(super) fn format(format_string: &str, args: &[Value]) -> Result<String, FunctionError> {
    let mut output = String::with_capacity(format_string.len());
    let mut chars = format_string.chars().peekable();
    let mut remaining = args.iter();

    while let Some(c) = chars.next() {
        if c != '%' {
            output.push(c);
            continue;
        }

        let mut left = false;
        let mut zero = false;
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => left = true,
                '0' => zero = true,
                _ => break,
            }
            chars.next();
        }

        let mut width = String::new();
        while let Some(&digit) = chars.peek().filter(|c| c.is_ascii_digit()) {
            width.push(digit);
            chars.next();
        }

        let mut precision = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while let Some(&digit) = chars.peek().filter(|c| c.is_ascii_digit()) {
                digits.push(digit);
                chars.next();
            }
            precision = Some(digits.parse::<usize>().unwrap_or(0));
        }

        let verb = chars
            .next()
            .ok_or_else(|| FunctionError::failed("format ends with an incomplete verb"))?;
        if verb == '%' {
            output.push('%');
            continue;
        }

        let arg = remaining.next().ok_or_else(|| {
            FunctionError::failed(format!("not enough arguments for `%{verb}`"))
        })?;

        let rendered = match verb {
            's' | 'v' => arg.to_text(),
            'q' => Value::String(arg.to_text()).to_json(),
            't' => arg
                .as_bool()
                .ok_or_else(|| FunctionError::failed("`%t` needs a bool"))?
                .to_string(),
            'd' => arg
                .as_i64()
                .ok_or_else(|| FunctionError::failed("`%d` needs a whole number"))?
                .to_string(),
            'f' => {
                let n = arg
                    .as_f64()
                    .ok_or_else(|| FunctionError::failed("`%f` needs a number"))?;
                format!("{:.*}", precision.unwrap_or(6), n)
            }
            other => {
                return Err(FunctionError::failed(format!(
                    "unsupported format verb `%{other}`"
                )))
            }
        };

        let width = width.parse::<usize>().unwrap_or(0);
        let padding = width.saturating_sub(rendered.chars().count());
        match (left, zero && matches!(verb, 'd' | 'f')) {
            (true, _) => {
                output.push_str(&rendered);
                output.extend(std::iter::repeat(' ').take(padding));
            }
            (false, true) => {
                let (sign, digits) = match rendered.strip_prefix('-') {
                    Some(digits) => ("-", digits),
                    None => ("", rendered.as_str()),
                };
                output.push_str(sign);
                output.extend(std::iter::repeat('0').take(padding));
                output.push_str(digits);
            }
            (false, false) => {
                output.extend(std::iter::repeat(' ').take(padding));
                output.push_str(&rendered);
            }
        }
    }

    if remaining.next().is_some() {
        return Err(FunctionError::failed("too many arguments for format"));
    }

    Ok(output)
}

fn formatlist(args: Vec<Value>) -> Result<Value, FunctionError> {
    let mut args = args.into_iter();
    let format_string = string(next(&mut args));
    let args: Vec<Value> = args.collect();

    let mut rows = None;
    for arg in &args {
        if let Value::Array(items) = arg {
            match rows {
                Some(len) if len != items.len() => {
                    return Err(FunctionError::failed(
                        "all list arguments must have the same length",
                    ))
                }
                _ => rows = Some(items.len()),
            }
        }
    }

    let rows = rows.unwrap_or(1);
    (0..rows)
        .map(|row| {
            let row_args: Vec<Value> = args
                .iter()
                .map(|arg| match arg {
                    Value::Array(items) => items[row].clone(),
                    scalar => scalar.clone(),
                })
                .collect();
            format(&format_string, &row_args).map(Value::String)
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

#[cfg(test)]
mod test {
    use crate::eval::functions::{Detached, FunctionRegistry};
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: Vec<Value>) -> Value {
        FunctionRegistry::standard()
            .call(name, args, &Detached)
            .unwrap()
    }

    fn s(value: &str) -> Value {
        Value::from(value)
    }

    #[test]
    fn format_verbs() {
        assert_eq!(
            call(
                "format",
                vec![s("%s-%03d-%.2f-%q"), s("web"), Value::Integer(7), Value::Decimal(1.5), s("x")]
            ),
            s("web-007-1.50-\"x\"")
        );
        assert_eq!(call("format", vec![s("%-4s|"), s("a")]), s("a   |"));
        assert_eq!(call("format", vec![s("100%%")]), s("100%"));
    }

    #[test]
    fn formatlist_zips_lists() {
        assert_eq!(
            call(
                "formatlist",
                vec![s("%s.%s"), Value::from(vec!["a", "b"]), s("example.com")]
            ),
            Value::from(vec!["a.example.com", "b.example.com"])
        );
    }

    #[test]
    fn regex_shapes() {
        assert_eq!(call("regex", vec![s("[a-z]+"), s("123abc456")]), s("abc"));
        assert_eq!(
            call("regex", vec![s("(\\d+)-(\\d+)"), s("10-20")]),
            Value::from(vec!["10", "20"])
        );
        let named = call("regex", vec![s("(?P<env>[a-z]+)-(?P<n>\\d)"), s("prod-1")]);
        assert_eq!(named.pointer("env"), Some(&s("prod")));
        assert_eq!(
            call("regexall", vec![s("\\d"), s("a1b2")]),
            Value::from(vec!["1", "2"])
        );
    }

    #[test]
    fn replace_literal_and_pattern() {
        assert_eq!(call("replace", vec![s("a.b.c"), s("."), s("-")]), s("a-b-c"));
        assert_eq!(
            call("replace", vec![s("v1.2.3"), s("/[0-9]/"), s("x")]),
            s("vx.x.x")
        );
    }

    #[test]
    fn slicing_and_trimming() {
        assert_eq!(
            call("substr", vec![s("hello world"), Value::Integer(1), Value::Integer(4)]),
            s("ello")
        );
        assert_eq!(
            call("substr", vec![s("hello"), Value::Integer(-3), Value::Integer(-1)]),
            s("llo")
        );
        assert_eq!(
            call("substr", vec![s("hello"), Value::Integer(2), Value::Integer(i64::MAX)]),
            s("llo")
        );
        assert_eq!(call("trim", vec![s("?!hello?!"), s("!?")]), s("hello"));
        assert_eq!(call("trimprefix", vec![s("helloworld"), s("hello")]), s("world"));
        assert_eq!(call("chomp", vec![s("hello\n\n")]), s("hello"));
        assert_eq!(call("title", vec![s("hello world")]), s("Hello World"));
        assert_eq!(call("strrev", vec![s("abc")]), s("cba"));
        assert_eq!(call("indent", vec![Value::Integer(2), s("a\nb")]), s("a\n  b"));
    }

    #[test]
    fn split_and_join() {
        assert_eq!(
            call("split", vec![s(","), s("a,b,c")]),
            Value::from(vec!["a", "b", "c"])
        );
        assert_eq!(
            call(
                "join",
                vec![s("-"), Value::from(vec!["a", "b"]), Value::from(vec!["c"])]
            ),
            s("a-b-c")
        );
    }
}
