//! Turning one input line into a [`Pipeline`] of [`SingleCommand`]s.
//!
//! Tokenization never mutates the input: every stage borrows the line and the resulting
//! command owns copies of its tokens, so stages can be parsed in any order.
use std::{fmt, ops::Range, path::PathBuf};

/// Maximum number of tokens in a single command, the command name included.
pub(crate) const MAX_TOKENS: usize = 32;
/// Maximum length in bytes of a command line.
pub(crate) const MAX_LINE_LEN: usize = 4096;
/// Shortest stage that still makes sense next to a separator, e.g. `a|`.
const MIN_STAGE_LEN: usize = 2;
/// Upper bound on the number of stages considered in one line.
pub(crate) const MAX_STAGES: usize = MAX_LINE_LEN / MIN_STAGE_LEN;

const STAGE_SEPARATOR: char = '|';
const BACKGROUND_MARKER: &str = "&";
const INPUT_REDIRECT: char = '<';
const OUTPUT_REDIRECT: char = '>';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    LineTooLong,
    EmptyStage,
    MissingCommand,
    TooManyTokens,
    MissingRedirectTarget(char),
    DuplicateRedirect(char),
    MisplacedRedirect { stage: usize, operator: char },
    MisplacedBackground { stage: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::LineTooLong => {
                write!(f, "command line too long (at most {MAX_LINE_LEN} bytes)")
            }
            ParseError::EmptyStage => f.write_str("syntax error: empty command in pipeline"),
            ParseError::MissingCommand => f.write_str("syntax error: missing command"),
            ParseError::TooManyTokens => {
                write!(f, "too many arguments (at most {MAX_TOKENS} are allowed)")
            }
            ParseError::MissingRedirectTarget(op) => {
                write!(f, "syntax error: missing file name after '{op}'")
            }
            ParseError::DuplicateRedirect(op) => {
                write!(f, "syntax error: more than one '{op}' redirection")
            }
            ParseError::MisplacedRedirect { stage, operator } => write!(
                f,
                "syntax error: '{operator}' is not allowed in stage {} of a pipeline",
                stage + 1
            ),
            ParseError::MisplacedBackground { stage } => write!(
                f,
                "syntax error: '{BACKGROUND_MARKER}' is only allowed at the end of a pipeline (found in stage {})",
                stage + 1
            ),
        }
    }
}

/// Strip the line terminator left by line-oriented reads.
pub fn cleanse_newline(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Split a line into its trimmed stages, in order.
///
/// A blank line has no stages. A blank stage next to a separator is an error.
pub fn split_pipeline(line: &str) -> Result<Vec<&str>, ParseError> {
    if line.trim().is_empty() {
        return Ok(Vec::new());
    }

    line.split(STAGE_SEPARATOR)
        .take(MAX_STAGES)
        .map(str::trim)
        .map(|stage| {
            if stage.is_empty() {
                Err(ParseError::EmptyStage)
            } else {
                Ok(stage)
            }
        })
        .collect()
}

/// A whitespace-delimited word of a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    // position of the token in the unmodified command
    index: usize,
    span: Range<usize>,
}

/// Split a single command on whitespace.
///
/// Fails if the command has more than [`MAX_TOKENS`] tokens; nothing is truncated.
pub fn tokenize(command: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut start = None;

    let boundary = std::iter::once((command.len(), ' '));
    for (pos, ch) in command.char_indices().chain(boundary) {
        match (start, ch.is_whitespace()) {
            (Some(begin), true) => {
                if tokens.len() == MAX_TOKENS {
                    return Err(ParseError::TooManyTokens);
                }
                tokens.push(Token {
                    text: command[begin..pos].to_string(),
                    index: tokens.len(),
                    span: begin..pos,
                });
                start = None;
            }
            (None, false) => start = Some(pos),
            _ => {}
        }
    }

    Ok(tokens)
}

/// Remove a trailing background marker, reporting whether there was one.
pub fn is_background_exec(tokens: &mut Vec<Token>) -> bool {
    match tokens.last() {
        Some(token) if token.text == BACKGROUND_MARKER => {
            tokens.pop();
            true
        }
        _ => false,
    }
}

/// Files a command wants as its standard input and output.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Redirections {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

/// Remove every `<file`, `< file`, `>file` and `> file` after the command name.
pub fn extract_redirections(tokens: &mut Vec<Token>) -> Result<Redirections, ParseError> {
    let mut redirections = Redirections::default();
    let mut kept = Vec::with_capacity(tokens.len());
    let mut rest = std::mem::take(tokens).into_iter().enumerate();

    while let Some((position, token)) = rest.next() {
        let operator = match token.text.chars().next() {
            Some(op @ (INPUT_REDIRECT | OUTPUT_REDIRECT)) if position > 0 => op,
            _ => {
                kept.push(token);
                continue;
            }
        };

        let target = if token.text.len() > operator.len_utf8() {
            token.text[operator.len_utf8()..].to_string()
        } else {
            match rest.next() {
                Some((_, file)) => file.text,
                None => return Err(ParseError::MissingRedirectTarget(operator)),
            }
        };

        let slot = if operator == INPUT_REDIRECT {
            &mut redirections.input
        } else {
            &mut redirections.output
        };
        if slot.replace(PathBuf::from(target)).is_some() {
            return Err(ParseError::DuplicateRedirect(operator));
        }
    }

    *tokens = kept;
    Ok(redirections)
}

/// One stage of a pipeline with its modifiers taken out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleCommand {
    pub argv: Vec<String>,
    /// The command text without the background marker and the redirections.
    pub line: String,
    pub background: bool,
    pub redirections: Redirections,
}

impl SingleCommand {
    pub fn parse(command: &str) -> Result<Self, ParseError> {
        let mut tokens = tokenize(command)?;
        let background = is_background_exec(&mut tokens);
        let redirections = extract_redirections(&mut tokens)?;

        if tokens.is_empty() {
            return Err(ParseError::MissingCommand);
        }

        Ok(Self {
            line: rebuild_line(command, &tokens),
            argv: tokens.into_iter().map(|token| token.text).collect(),
            background,
            redirections,
        })
    }

    pub fn name(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    /// Everything after the command name, with the original spacing between the arguments.
    pub fn raw_args(&self) -> &str {
        self.line[self.name().len()..].trim()
    }
}

// Keep the original text between tokens that were adjacent before extraction; anything that was
// removed from between two tokens collapses into a single space.
fn rebuild_line(command: &str, tokens: &[Token]) -> String {
    let mut line = String::with_capacity(command.len());
    let mut previous: Option<&Token> = None;

    for token in tokens {
        if let Some(prev) = previous {
            if token.index == prev.index + 1 {
                line.push_str(&command[prev.span.end..token.span.start]);
            } else {
                line.push(' ');
            }
        }
        line.push_str(&command[token.span.clone()]);
        previous = Some(token);
    }

    line
}

/// The ordered stages of one command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<SingleCommand>,
}

impl Pipeline {
    /// A trailing background marker applies to the whole pipeline.
    pub fn is_background(&self) -> bool {
        self.stages.last().map_or(false, |stage| stage.background)
    }

    // Only the first stage may read from a file and only the last one may write to a file; the
    // others are connected to pipes.
    fn validate(&self) -> Result<(), ParseError> {
        let last = self.stages.len() - 1;
        for (stage, command) in self.stages.iter().enumerate() {
            if stage > 0 && command.redirections.input.is_some() {
                return Err(ParseError::MisplacedRedirect {
                    stage,
                    operator: INPUT_REDIRECT,
                });
            }
            if stage < last && command.redirections.output.is_some() {
                return Err(ParseError::MisplacedRedirect {
                    stage,
                    operator: OUTPUT_REDIRECT,
                });
            }
            if stage < last && command.background {
                return Err(ParseError::MisplacedBackground { stage });
            }
        }

        Ok(())
    }
}

/// Parse a raw input line. A blank line yields `None`.
pub fn parse_line(line: &str) -> Result<Option<Pipeline>, ParseError> {
    let line = cleanse_newline(line);
    if line.len() > MAX_LINE_LEN {
        return Err(ParseError::LineTooLong);
    }

    let stages = split_pipeline(line)?
        .into_iter()
        .map(SingleCommand::parse)
        .collect::<Result<Vec<_>, _>>()?;

    if stages.is_empty() {
        return Ok(None);
    }

    let pipeline = Pipeline { stages };
    pipeline.validate()?;

    Ok(Some(pipeline))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|token| token.text.as_str()).collect()
    }

    #[test]
    fn cleanse_newline_is_idempotent() {
        assert_eq!(cleanse_newline("ls -l\n"), "ls -l");
        assert_eq!(cleanse_newline("ls -l\r\n"), "ls -l");
        assert_eq!(cleanse_newline(cleanse_newline("ls -l\n")), "ls -l");
        assert_eq!(cleanse_newline("ls -l"), "ls -l");
        assert_eq!(cleanse_newline(""), "");
    }

    #[test]
    fn split_stages() {
        assert_eq!(split_pipeline("").unwrap(), Vec::<&str>::new());
        assert_eq!(split_pipeline("   \t").unwrap(), Vec::<&str>::new());
        assert_eq!(split_pipeline("ls -l").unwrap(), vec!["ls -l"]);
        assert_eq!(
            split_pipeline("cat f | grep x |wc -l").unwrap(),
            vec!["cat f", "grep x", "wc -l"]
        );
        assert_eq!(split_pipeline("ls ||wc"), Err(ParseError::EmptyStage));
        assert_eq!(split_pipeline("| wc"), Err(ParseError::EmptyStage));
        assert_eq!(split_pipeline("ls |"), Err(ParseError::EmptyStage));
    }

    #[test]
    fn split_is_bounded() {
        let line = vec!["a"; MAX_STAGES + 10].join("|");
        assert_eq!(split_pipeline(&line).unwrap().len(), MAX_STAGES);
    }

    #[test]
    fn tokenize_on_any_whitespace() {
        let tokens = tokenize("  ls\t-l   /tmp ").unwrap();
        assert_eq!(texts(&tokens), vec!["ls", "-l", "/tmp"]);
        assert!(tokenize("   ").unwrap().is_empty());
    }

    #[test]
    fn tokenize_rejects_too_many_tokens() {
        let at_limit = vec!["x"; MAX_TOKENS].join(" ");
        assert_eq!(tokenize(&at_limit).unwrap().len(), MAX_TOKENS);

        let over_limit = vec!["x"; MAX_TOKENS + 1].join(" ");
        assert_eq!(tokenize(&over_limit), Err(ParseError::TooManyTokens));
        assert_eq!(
            SingleCommand::parse(&over_limit),
            Err(ParseError::TooManyTokens)
        );
    }

    #[test]
    fn background_marker_is_stripped() {
        let mut tokens = tokenize("sleep 10 &").unwrap();
        assert!(is_background_exec(&mut tokens));
        assert_eq!(texts(&tokens), vec!["sleep", "10"]);

        let command = SingleCommand::parse("echo hello &").unwrap();
        assert!(command.background);
        assert_eq!(command.argv, vec!["echo", "hello"]);
        assert_eq!(command.line, "echo hello");
        assert_eq!(command.raw_args(), "hello");
    }

    #[test]
    fn no_background_marker_leaves_tokens_alone() {
        for line in ["sleep 10", "echo a&b", "echo &x"] {
            let mut tokens = tokenize(line).unwrap();
            let before = tokens.clone();
            assert!(!is_background_exec(&mut tokens));
            assert_eq!(tokens, before);
        }
    }

    #[test]
    fn redirections_are_extracted() {
        let mut tokens = tokenize("cat < in.txt > out.txt").unwrap();
        let redirections = extract_redirections(&mut tokens).unwrap();
        assert_eq!(texts(&tokens), vec!["cat"]);
        assert_eq!(
            redirections,
            Redirections {
                input: Some("in.txt".into()),
                output: Some("out.txt".into()),
            }
        );

        let mut tokens = tokenize("sort -r <in.txt >out.txt").unwrap();
        let redirections = extract_redirections(&mut tokens).unwrap();
        assert_eq!(texts(&tokens), vec!["sort", "-r"]);
        assert_eq!(redirections.input, Some("in.txt".into()));
        assert_eq!(redirections.output, Some("out.txt".into()));
    }

    #[test]
    fn redirection_errors() {
        let mut tokens = tokenize("cat <").unwrap();
        assert_eq!(
            extract_redirections(&mut tokens),
            Err(ParseError::MissingRedirectTarget('<'))
        );

        let mut tokens = tokenize("cat > a > b").unwrap();
        assert_eq!(
            extract_redirections(&mut tokens),
            Err(ParseError::DuplicateRedirect('>'))
        );

        assert_eq!(SingleCommand::parse("&"), Err(ParseError::MissingCommand));

        // operators are only recognized after the command name
        let command = SingleCommand::parse("> out.txt").unwrap();
        assert_eq!(command.argv, vec![">", "out.txt"]);
        assert_eq!(command.redirections, Redirections::default());
    }

    #[test]
    fn line_keeps_spacing_but_drops_modifiers() {
        let command = SingleCommand::parse("echo  a   b > out.txt c &").unwrap();
        assert_eq!(command.line, "echo  a   b c");
        assert_eq!(command.raw_args(), "a   b c");
        assert_eq!(command.args(), ["a", "b", "c"]);
        assert_eq!(command.redirections.output, Some("out.txt".into()));

        let command = SingleCommand::parse("echo").unwrap();
        assert_eq!(command.raw_args(), "");
        assert_eq!(command.name(), "echo");
    }

    #[test]
    fn parse_whole_lines() {
        assert_eq!(parse_line("\n").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);

        let pipeline = parse_line("cat < in.txt | sort | uniq > out.txt &\n")
            .unwrap()
            .unwrap();
        assert_eq!(pipeline.stages.len(), 3);
        assert!(pipeline.is_background());
        assert_eq!(pipeline.stages[0].redirections.input, Some("in.txt".into()));
        assert_eq!(pipeline.stages[1].argv, vec!["sort"]);
        assert_eq!(pipeline.stages[2].redirections.output, Some("out.txt".into()));

        let pipeline = parse_line("echo hi | cat").unwrap().unwrap();
        assert!(!pipeline.is_background());
    }

    #[test]
    fn misplaced_modifiers_reject_the_pipeline() {
        assert_eq!(
            parse_line("cat | sort < in.txt"),
            Err(ParseError::MisplacedRedirect {
                stage: 1,
                operator: '<'
            })
        );
        assert_eq!(
            parse_line("cat > out.txt | sort"),
            Err(ParseError::MisplacedRedirect {
                stage: 0,
                operator: '>'
            })
        );
        assert_eq!(
            parse_line("sleep 1 & | cat"),
            Err(ParseError::MisplacedBackground { stage: 0 })
        );
    }

    #[test]
    fn overlong_lines_are_rejected() {
        let line = format!("echo {}", "x".repeat(MAX_LINE_LEN));
        assert_eq!(parse_line(&line), Err(ParseError::LineTooLong));
    }
}
