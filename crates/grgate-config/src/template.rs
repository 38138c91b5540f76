//! Text templates for release notes and the dashboard issue.
//!
//! The syntax follows Go's `text/template`, which users of the release note
//! and dashboard settings are likely to know:
//!
//! - `{{ .Field.Sub }}` prints a field of the current value, `{{ . }}` the value itself
//! - `{{ $ }}` is the root data, `{{ $name := pipeline }}` declares a variable
//! - `{{ if pipeline }} .. {{ else if pipeline }} .. {{ else }} .. {{ end }}`
//! - `{{ range pipeline }} .. {{ else }} .. {{ end }}`, with optional
//!   `$index, $element :=` declarations
//! - `{{ with pipeline }} .. {{ else }} .. {{ end }}`
//! - `{{- ` and ` -}}` trim the whitespace before and after an action
//! - `{{/* comment */}}`
//! - pipelines `{{ .Statuses | len }}` and the functions `eq`, `ne`, `not`,
//!   `and`, `or` and `len`
//!
//! Data is anything implementing [`Serialize`]; it is evaluated as JSON.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template: {name}:{line}: {message}")]
    Parse {
        name: String,
        line: usize,
        message: String,
    },

    #[error("template: {name}: {message}")]
    Execute { name: String, message: String },

    #[error("template data: {0}")]
    Data(#[from] serde_json::Error),
}

pub type TemplateResult<T> = std::result::Result<T, TemplateError>;

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    root: Vec<Node>,
}

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Action(Pipeline),
    If {
        branches: Vec<(Pipeline, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
    Range {
        pipeline: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    With {
        pipeline: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

#[derive(Debug, Clone)]
struct Pipeline {
    decl: Vec<String>,
    commands: Vec<Command>,
}

#[derive(Debug, Clone)]
struct Command {
    args: Vec<Operand>,
}

#[derive(Debug, Clone)]
enum Operand {
    Field(Vec<String>),
    Variable(String, Vec<String>),
    Literal(Value),
    Function(String),
    Sub(Pipeline),
}

impl Template {
    pub fn parse(name: &str, text: &str) -> TemplateResult<Self> {
        let segments = lex(name, text)?;
        let mut parser = Parser {
            name,
            segments,
            pos: 0,
        };

        let (root, stop) = parser.parse_list()?;
        if let Some((stop, line)) = stop {
            return Err(parse_error(name, line, format!("unexpected {}", stop.describe())));
        }

        Ok(Self {
            name: name.to_string(),
            root,
        })
    }

    /// Render the template with any serializable data.
    pub fn render<T: Serialize>(&self, data: &T) -> TemplateResult<String> {
        let value = serde_json::to_value(data)?;
        self.render_value(&value)
    }

    pub fn render_value(&self, data: &Value) -> TemplateResult<String> {
        let mut exec = Exec {
            name: &self.name,
            vars: vec![("$".to_string(), data.clone())],
        };
        let mut out = String::new();
        exec.walk(&self.root, data, &mut out)?;
        Ok(out)
    }
}

fn parse_error(name: &str, line: usize, message: impl Into<String>) -> TemplateError {
    TemplateError::Parse {
        name: name.to_string(),
        line,
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Lexing: split text and actions, applying trim markers
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Segment {
    Text(String),
    Action { content: String, line: usize },
}

fn lex(name: &str, text: &str) -> TemplateResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = text;
    let mut line = 1;
    let mut trim_next = false;

    while let Some(open) = rest.find("{{") {
        let mut before = &rest[..open];
        if trim_next {
            before = before.trim_start();
        }
        line += rest[..open].matches('\n').count();

        let mut inner = &rest[open + 2..];
        let trim_left = inner.starts_with('-') && inner[1..].starts_with(char::is_whitespace);
        if trim_left {
            inner = &inner[1..];
            before = before.trim_end();
        }
        if !before.is_empty() {
            segments.push(Segment::Text(before.to_string()));
        }

        let close = find_close(inner).ok_or_else(|| parse_error(name, line, "unclosed action"))?;
        let mut content = &inner[..close];
        trim_next = content.ends_with('-')
            && content[..content.len() - 1].ends_with(char::is_whitespace);
        if trim_next {
            content = &content[..content.len() - 1];
        }

        let content = content.trim();
        if content.starts_with("/*") {
            if !content.ends_with("*/") {
                return Err(parse_error(name, line, "unclosed comment"));
            }
        } else {
            segments.push(Segment::Action {
                content: content.to_string(),
                line,
            });
        }

        line += inner[..close].matches('\n').count();
        rest = &inner[close + 2..];
    }

    let tail = if trim_next { rest.trim_start() } else { rest };
    if !tail.is_empty() {
        segments.push(Segment::Text(tail.to_string()));
    }

    Ok(segments)
}

/// Offset of the closing `}}`, skipping quoted strings and comments.
fn find_close(inner: &str) -> Option<usize> {
    let trimmed = inner.trim_start();
    if trimmed.starts_with("/*") {
        let start = inner.len() - trimmed.len();
        let end = start + trimmed.find("*/")? + 2;
        return inner[end..].find("}}").map(|i| end + i);
    }

    let bytes = inner.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'`' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'`' {
                    i += 1;
                }
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

// ---------------------------------------------------------------------------
// Action tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(Vec<String>),
    Variable(String, Vec<String>),
    Literal(Value),
    Ident(String),
    LeftParen,
    RightParen,
    Pipe,
    Declare,
    Comma,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn take_while(chars: &[char], mut i: usize, f: impl Fn(char) -> bool) -> usize {
    while i < chars.len() && f(chars[i]) {
        i += 1;
    }
    i
}

/// Read a `.Field.Sub` chain starting at `i`. Returns the names and the new offset.
fn field_chain(chars: &[char], mut i: usize) -> (Vec<String>, usize) {
    let mut fields = Vec::new();
    while i < chars.len() && chars[i] == '.' {
        let end = take_while(chars, i + 1, is_ident_char);
        if end == i + 1 {
            break;
        }
        fields.push(chars[i + 1..end].iter().collect());
        i = end;
    }
    (fields, i)
}

fn tokenize(content: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = content.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LeftParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RightParen);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ':' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Declare);
                i += 2;
            }
            '"' => {
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated quoted string".to_string()),
                        Some('"') => break,
                        Some('\\') => {
                            let escaped = chars.get(i + 1).ok_or("unterminated quoted string")?;
                            value.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                'r' => '\r',
                                other => *other,
                            });
                            i += 2;
                        }
                        Some(other) => {
                            value.push(*other);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Literal(Value::String(value)));
                i += 1;
            }
            '`' => {
                let end = take_while(&chars, i + 1, |c| c != '`');
                if end >= chars.len() {
                    return Err("unterminated raw quoted string".to_string());
                }
                tokens.push(Token::Literal(Value::String(chars[i + 1..end].iter().collect())));
                i = end + 1;
            }
            '.' => {
                let (fields, end) = field_chain(&chars, i);
                if fields.is_empty() {
                    i += 1;
                } else {
                    i = end;
                }
                tokens.push(Token::Field(fields));
            }
            '$' => {
                let end = take_while(&chars, i + 1, is_ident_char);
                let name: String = chars[i..end].iter().collect();
                let (fields, end) = field_chain(&chars, end);
                tokens.push(Token::Variable(name, fields));
                i = end;
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) =>
            {
                let end = take_while(&chars, i + 1, |d| d.is_ascii_digit() || d == '.');
                let text: String = chars[i..end].iter().collect();
                let number = if let Ok(n) = text.parse::<i64>() {
                    Value::from(n)
                } else {
                    text.parse::<f64>()
                        .ok()
                        .and_then(serde_json::Number::from_f64)
                        .map(Value::Number)
                        .ok_or_else(|| format!("bad number syntax: {}", text))?
                };
                tokens.push(Token::Literal(number));
                i = end;
            }
            c if is_ident_char(c) => {
                let end = take_while(&chars, i, is_ident_char);
                let word: String = chars[i..end].iter().collect();
                tokens.push(match word.as_str() {
                    "true" => Token::Literal(Value::Bool(true)),
                    "false" => Token::Literal(Value::Bool(false)),
                    "nil" => Token::Literal(Value::Null),
                    _ => Token::Ident(word),
                });
                i = end;
            }
            other => return Err(format!("unexpected {:?} in command", other)),
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Keyword that closed a list of nodes.
enum Stop {
    End,
    Else,
    ElseIf(Pipeline),
}

impl Stop {
    fn describe(&self) -> &'static str {
        match self {
            Stop::End => "{{end}}",
            Stop::Else | Stop::ElseIf(_) => "{{else}}",
        }
    }
}

struct Parser<'a> {
    name: &'a str,
    segments: Vec<Segment>,
    pos: usize,
}

impl Parser<'_> {
    fn parse_list(&mut self) -> TemplateResult<(Vec<Node>, Option<(Stop, usize)>)> {
        let mut nodes = Vec::new();

        while self.pos < self.segments.len() {
            let segment = &self.segments[self.pos];
            self.pos += 1;

            let (content, line) = match segment {
                Segment::Text(text) => {
                    nodes.push(Node::Text(text.clone()));
                    continue;
                }
                Segment::Action { content, line } => (content.clone(), *line),
            };

            let tokens = tokenize(&content).map_err(|e| parse_error(self.name, line, e))?;
            let keyword = match tokens.first() {
                Some(Token::Ident(word)) => word.as_str(),
                None => return Err(parse_error(self.name, line, "missing value for command")),
                _ => "",
            };

            match keyword {
                "end" => {
                    if tokens.len() > 1 {
                        return Err(parse_error(self.name, line, "unexpected token after end"));
                    }
                    return Ok((nodes, Some((Stop::End, line))));
                }
                "else" => {
                    let stop = match tokens.get(1) {
                        None => Stop::Else,
                        Some(Token::Ident(word)) if word == "if" => {
                            Stop::ElseIf(self.pipeline(&tokens[2..], line)?)
                        }
                        Some(_) => {
                            return Err(parse_error(self.name, line, "unexpected token after else"));
                        }
                    };
                    return Ok((nodes, Some((stop, line))));
                }
                "if" => nodes.push(self.parse_if(&tokens[1..], line)?),
                "range" | "with" => {
                    let pipeline = self.pipeline(&tokens[1..], line)?;
                    let (body, otherwise) = self.parse_block_body(keyword, line)?;
                    nodes.push(if keyword == "range" {
                        Node::Range {
                            pipeline,
                            body,
                            otherwise,
                        }
                    } else {
                        Node::With {
                            pipeline,
                            body,
                            otherwise,
                        }
                    });
                }
                _ => nodes.push(Node::Action(self.pipeline(&tokens, line)?)),
            }
        }

        Ok((nodes, None))
    }

    fn parse_if(&mut self, tokens: &[Token], line: usize) -> TemplateResult<Node> {
        let mut branches = Vec::new();
        let mut condition = self.pipeline(tokens, line)?;

        loop {
            let (body, stop) = self.parse_list()?;
            branches.push((condition, body));
            match stop {
                Some((Stop::End, _)) => {
                    return Ok(Node::If {
                        branches,
                        otherwise: Vec::new(),
                    });
                }
                Some((Stop::ElseIf(next), _)) => condition = next,
                Some((Stop::Else, _)) => {
                    let otherwise = self.parse_else_body("if", line)?;
                    return Ok(Node::If {
                        branches,
                        otherwise,
                    });
                }
                None => return Err(parse_error(self.name, line, "unexpected EOF in if")),
            }
        }
    }

    /// Body and optional else branch of `range` or `with`.
    fn parse_block_body(
        &mut self,
        keyword: &str,
        line: usize,
    ) -> TemplateResult<(Vec<Node>, Vec<Node>)> {
        let (body, stop) = self.parse_list()?;
        match stop {
            Some((Stop::End, _)) => Ok((body, Vec::new())),
            Some((Stop::Else, _)) => Ok((body, self.parse_else_body(keyword, line)?)),
            Some((Stop::ElseIf(_), else_line)) => Err(parse_error(
                self.name,
                else_line,
                format!("else if is not allowed in {}", keyword),
            )),
            None => Err(parse_error(
                self.name,
                line,
                format!("unexpected EOF in {}", keyword),
            )),
        }
    }

    fn parse_else_body(&mut self, keyword: &str, line: usize) -> TemplateResult<Vec<Node>> {
        let (otherwise, stop) = self.parse_list()?;
        match stop {
            Some((Stop::End, _)) => Ok(otherwise),
            Some((_, else_line)) => Err(parse_error(
                self.name,
                else_line,
                format!("expected end; found {{{{else}}}} in {}", keyword),
            )),
            None => Err(parse_error(
                self.name,
                line,
                format!("unexpected EOF in {}", keyword),
            )),
        }
    }

    fn pipeline(&self, tokens: &[Token], line: usize) -> TemplateResult<Pipeline> {
        let mut pos = 0;
        let pipeline = parse_pipeline(tokens, &mut pos).map_err(|e| parse_error(self.name, line, e))?;
        if pos < tokens.len() {
            return Err(parse_error(self.name, line, "unexpected right paren"));
        }
        if pipeline.commands.is_empty() {
            return Err(parse_error(self.name, line, "missing value for command"));
        }
        Ok(pipeline)
    }
}

fn parse_pipeline(tokens: &[Token], pos: &mut usize) -> Result<Pipeline, String> {
    let mut decl = Vec::new();

    // `$x :=` or `$i, $x :=`
    let lookahead: Vec<&Token> = tokens[*pos..].iter().take(4).collect();
    match lookahead.as_slice() {
        [Token::Variable(a, fa), Token::Declare, ..] if fa.is_empty() => {
            decl.push(a.clone());
            *pos += 2;
        }
        [
            Token::Variable(a, fa),
            Token::Comma,
            Token::Variable(b, fb),
            Token::Declare,
        ] if fa.is_empty() && fb.is_empty() => {
            decl.push(a.clone());
            decl.push(b.clone());
            *pos += 4;
        }
        _ => {}
    }

    let mut commands = Vec::new();
    let mut args = Vec::new();

    while let Some(token) = tokens.get(*pos) {
        match token {
            Token::RightParen => break,
            Token::Pipe => {
                if args.is_empty() {
                    return Err("missing command before pipe".to_string());
                }
                commands.push(Command {
                    args: std::mem::take(&mut args),
                });
                *pos += 1;
            }
            Token::LeftParen => {
                *pos += 1;
                let sub = parse_pipeline(tokens, pos)?;
                if tokens.get(*pos) != Some(&Token::RightParen) {
                    return Err("unclosed left paren".to_string());
                }
                if sub.commands.is_empty() {
                    return Err("missing value in parenthesized pipeline".to_string());
                }
                *pos += 1;
                args.push(Operand::Sub(sub));
            }
            Token::Field(fields) => {
                args.push(Operand::Field(fields.clone()));
                *pos += 1;
            }
            Token::Variable(name, fields) => {
                args.push(Operand::Variable(name.clone(), fields.clone()));
                *pos += 1;
            }
            Token::Literal(value) => {
                args.push(Operand::Literal(value.clone()));
                *pos += 1;
            }
            Token::Ident(name) => {
                if !is_function(name) {
                    return Err(format!("function \"{}\" not defined", name));
                }
                args.push(Operand::Function(name.clone()));
                *pos += 1;
            }
            Token::Declare | Token::Comma => return Err("unexpected declaration".to_string()),
        }
    }

    if !args.is_empty() {
        commands.push(Command { args });
    } else if !commands.is_empty() {
        return Err("missing command after pipe".to_string());
    }

    Ok(Pipeline { decl, commands })
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

const FUNCTIONS: &[&str] = &["and", "eq", "len", "ne", "not", "or"];

fn is_function(name: &str) -> bool {
    FUNCTIONS.contains(&name)
}

/// Go truthiness: false, 0, empty strings and empty collections are false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn print(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                print(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push_str("map[");
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(key);
                out.push(':');
                print(item, out);
            }
            out.push(']');
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

struct Exec<'a> {
    name: &'a str,
    vars: Vec<(String, Value)>,
}

impl Exec<'_> {
    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::Execute {
            name: self.name.to_string(),
            message: message.into(),
        }
    }

    fn walk(&mut self, nodes: &[Node], dot: &Value, out: &mut String) -> TemplateResult<()> {
        let mark = self.vars.len();
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Action(pipeline) => {
                    let value = self.eval_pipeline(pipeline, dot)?;
                    if pipeline.decl.is_empty() {
                        print(&value, out);
                    } else {
                        for name in &pipeline.decl {
                            self.vars.push((name.clone(), value.clone()));
                        }
                    }
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mut taken = false;
                    for (condition, body) in branches {
                        if truthy(&self.eval_pipeline(condition, dot)?) {
                            self.walk(body, dot, out)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        self.walk(otherwise, dot, out)?;
                    }
                }
                Node::With {
                    pipeline,
                    body,
                    otherwise,
                } => {
                    let value = self.eval_pipeline(pipeline, dot)?;
                    if truthy(&value) {
                        self.walk(body, &value, out)?;
                    } else {
                        self.walk(otherwise, dot, out)?;
                    }
                }
                Node::Range {
                    pipeline,
                    body,
                    otherwise,
                } => {
                    let value = self.eval_pipeline(pipeline, dot)?;
                    let items: Vec<(Value, Value)> = match value {
                        Value::Null => Vec::new(),
                        Value::Array(items) => items
                            .into_iter()
                            .enumerate()
                            .map(|(i, item)| (Value::from(i), item))
                            .collect(),
                        Value::Object(map) => {
                            map.into_iter().map(|(k, v)| (Value::String(k), v)).collect()
                        }
                        Value::Number(n) => match n.as_u64() {
                            Some(count) => (0..count).map(|i| (Value::from(i), Value::from(i))).collect(),
                            None => return Err(self.error(format!("range can't iterate over {}", n))),
                        },
                        other => {
                            return Err(self.error(format!("range can't iterate over {}", other)));
                        }
                    };

                    if items.is_empty() {
                        self.walk(otherwise, dot, out)?;
                        continue;
                    }

                    for (key, item) in items {
                        let scope = self.vars.len();
                        match pipeline.decl.as_slice() {
                            [element] => self.vars.push((element.clone(), item.clone())),
                            [index, element] => {
                                self.vars.push((index.clone(), key));
                                self.vars.push((element.clone(), item.clone()));
                            }
                            _ => {}
                        }
                        self.walk(body, &item, out)?;
                        self.vars.truncate(scope);
                    }
                }
            }
        }
        self.vars.truncate(mark);
        Ok(())
    }

    fn eval_pipeline(&self, pipeline: &Pipeline, dot: &Value) -> TemplateResult<Value> {
        let mut piped: Option<Value> = None;
        for command in &pipeline.commands {
            piped = Some(self.eval_command(command, dot, piped)?);
        }
        Ok(piped.unwrap_or(Value::Null))
    }

    fn eval_command(
        &self,
        command: &Command,
        dot: &Value,
        piped: Option<Value>,
    ) -> TemplateResult<Value> {
        let Some((head, rest)) = command.args.split_first() else {
            return Err(self.error("empty command"));
        };

        if let Operand::Function(name) = head {
            let mut args = rest
                .iter()
                .map(|arg| self.eval_operand(arg, dot))
                .collect::<TemplateResult<Vec<_>>>()?;
            args.extend(piped);
            return self.call(name, args);
        }

        if !rest.is_empty() || piped.is_some() {
            return Err(self.error("can't give argument to non-function"));
        }
        self.eval_operand(head, dot)
    }

    fn eval_operand(&self, operand: &Operand, dot: &Value) -> TemplateResult<Value> {
        match operand {
            Operand::Field(fields) => self.lookup(dot, fields),
            Operand::Variable(name, fields) => {
                let value = self
                    .vars
                    .iter()
                    .rev()
                    .find(|(var, _)| var == name)
                    .map(|(_, value)| value)
                    .ok_or_else(|| self.error(format!("undefined variable: {}", name)))?;
                self.lookup(value, fields)
            }
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Function(name) => self.call(name, Vec::new()),
            Operand::Sub(pipeline) => self.eval_pipeline(pipeline, dot),
        }
    }

    fn lookup(&self, value: &Value, fields: &[String]) -> TemplateResult<Value> {
        let mut current = value;
        for field in fields {
            current = match current {
                Value::Null => return Ok(Value::Null),
                Value::Object(map) => map
                    .get(field)
                    .ok_or_else(|| self.error(format!("can't evaluate field {}", field)))?,
                other => {
                    return Err(self.error(format!(
                        "can't evaluate field {} in type {}",
                        field,
                        type_name(other)
                    )));
                }
            };
        }
        Ok(current.clone())
    }

    fn call(&self, name: &str, args: Vec<Value>) -> TemplateResult<Value> {
        let arity = |min: usize| {
            if args.len() < min {
                Err(self.error(format!(
                    "wrong number of args for {}: want at least {} got {}",
                    name,
                    min,
                    args.len()
                )))
            } else {
                Ok(())
            }
        };

        match name {
            "eq" => {
                arity(2)?;
                Ok(Value::Bool(args[1..].iter().any(|arg| values_equal(&args[0], arg))))
            }
            "ne" => {
                arity(2)?;
                Ok(Value::Bool(!values_equal(&args[0], &args[1])))
            }
            "not" => {
                arity(1)?;
                Ok(Value::Bool(!truthy(&args[0])))
            }
            "and" => {
                arity(1)?;
                let last = args.len() - 1;
                let position = args.iter().position(|arg| !truthy(arg)).unwrap_or(last);
                Ok(args[position].clone())
            }
            "or" => {
                arity(1)?;
                let last = args.len() - 1;
                let position = args.iter().position(truthy).unwrap_or(last);
                Ok(args[position].clone())
            }
            "len" => {
                arity(1)?;
                let len = match &args[0] {
                    Value::String(s) => s.len(),
                    Value::Array(a) => a.len(),
                    Value::Object(o) => o.len(),
                    Value::Null => 0,
                    other => {
                        return Err(self.error(format!("len of type {}", type_name(other))));
                    }
                };
                Ok(Value::from(len))
            }
            _ => Err(self.error(format!("function \"{}\" not defined", name))),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "nil",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "slice",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(text: &str, data: Value) -> String {
        Template::parse("test", text).unwrap().render_value(&data).unwrap()
    }

    #[test]
    fn test_fields_and_literals() {
        let data = json!({"Name": "v1.0.0", "Release": {"Tag": "v1"}, "Count": 3});
        assert_eq!(run("tag {{ .Release.Tag }} of {{.Name}}", data.clone()), "tag v1 of v1.0.0");
        assert_eq!(run("{{ .Count }} {{ true }} {{ \"x\" }} {{ `raw` }}", data), "3 true x raw");
    }

    #[test]
    fn test_trim_markers() {
        let data = json!({"A": "a", "B": "b"});
        assert_eq!(run("  {{- .A -}}  \n  {{ .B }}", data.clone()), "ab");
        assert_eq!(run("x\n{{- /* note */ -}}\ny", data), "xy");
    }

    #[test]
    fn test_if_else_chain() {
        let tpl = "{{ if eq .State \"success\" }}ok{{ else if eq .State \"failure\" }}ko{{ else }}?{{ end }}";
        assert_eq!(run(tpl, json!({"State": "success"})), "ok");
        assert_eq!(run(tpl, json!({"State": "failure"})), "ko");
        assert_eq!(run(tpl, json!({"State": ""})), "?");
    }

    #[test]
    fn test_range_with_else_and_variables() {
        let tpl = "{{ range $i, $s := .Statuses }}{{ $i }}={{ $s.Name }}@{{ $.Sha }} {{ else }}none{{ end }}";
        let data = json!({"Sha": "abc", "Statuses": [{"Name": "a"}, {"Name": "b"}]});
        assert_eq!(run(tpl, data), "0=a@abc 1=b@abc ");
        assert_eq!(run(tpl, json!({"Sha": "abc", "Statuses": []})), "none");
        assert_eq!(run(tpl, json!({"Sha": "abc", "Statuses": null})), "none");
    }

    #[test]
    fn test_functions_and_pipes() {
        let data = json!({"Status": "completed", "State": "success", "Errors": ["a", "b"]});
        assert_eq!(
            run("{{ if or (eq .Status \"completed\") (eq .Status \"success\") }}x{{ end }}", data.clone()),
            "x"
        );
        assert_eq!(run("{{ and .Status .State }}|{{ or \"\" .State }}", data.clone()), "success|success");
        assert_eq!(run("{{ .Errors | len }} {{ len .Status }}", data.clone()), "2 9");
        assert_eq!(run("{{ not .Errors }} {{ ne 1 2 }} {{ eq 2 2.0 }}", data.clone()), "false true true");
        assert_eq!(run("{{ $n := len .Errors }}{{ $n }}", data), "2");
    }

    #[test]
    fn test_with_block() {
        let tpl = "{{ with .Release }}{{ .Tag }}{{ else }}no release{{ end }}";
        assert_eq!(run(tpl, json!({"Release": {"Tag": "v2"}})), "v2");
        assert_eq!(run(tpl, json!({"Release": null})), "no release");
    }

    #[test]
    fn test_parse_errors() {
        for text in [
            "{{ if .A }}unclosed",
            "{{ end }}",
            "{{ .A ",
            "{{ printf \"%s\" .A }}",
            "{{ range .A }}{{ else if .B }}{{ end }}",
            "{{ \"unterminated }}",
            "{{ }}",
        ] {
            let err = Template::parse("test", text).unwrap_err();
            assert!(matches!(err, TemplateError::Parse { .. }), "{}", text);
        }
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = Template::parse("note", "line one\nline two\n{{ end }}").unwrap_err();
        assert_eq!(err.to_string(), "template: note:3: unexpected {{end}}");
    }

    #[test]
    fn test_execute_errors() {
        let template = Template::parse("test", "{{ .Missing }}").unwrap();
        assert!(matches!(
            template.render_value(&json!({})).unwrap_err(),
            TemplateError::Execute { .. }
        ));

        let template = Template::parse("test", "{{ range .A }}{{ end }}").unwrap();
        assert!(template.render_value(&json!({"A": "string"})).is_err());
    }

    #[test]
    fn test_render_serializable_data() {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Data {
            release_note: String,
        }

        let template = Template::parse("test", "[{{ .ReleaseNote }}]").unwrap();
        let out = template
            .render(&Data {
                release_note: "notes".to_string(),
            })
            .unwrap();
        assert_eq!(out, "[notes]");
    }
}
