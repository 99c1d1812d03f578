//! CLI subcommand definitions and handlers.
//!
//! Uses clap derive to define the subcommand hierarchy:
//! - `interactive` (default) -- read prompts from stdin, one generation per line
//! - `generate <PROMPT>` -- run a single generation
//! - `classify [TEXT]` -- extract media links without calling a model
//! - `config show|path` -- inspect configuration
//! - `version` -- print version info

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::config::{self, Config, ConfigError};
use crate::generation::{self, GenerationConfig, GenerationError, GenerationResult, TextGenerator};
use crate::media::{self, MediaClassification};

/// Message shown when a generation is requested with no prompt.
pub const EMPTY_PROMPT_MESSAGE: &str = "Please enter a prompt.";

/// Generate text with AWS Bedrock and preview the media it links to.
#[derive(Parser, Debug)]
#[command(
    name = "bedrock-preview",
    version = env!("CARGO_PKG_VERSION"),
    about = "Generate text with AWS Bedrock and preview embedded media links"
)]
pub struct Cli {
    /// Path to a JSON5 config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read prompts from stdin and generate for each line (default).
    Interactive {
        #[command(flatten)]
        overrides: ModelOverrides,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Generate text for a single prompt.
    Generate {
        /// Prompt sent to the model.
        prompt: String,

        #[command(flatten)]
        overrides: ModelOverrides,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Extract video and image links from text (argument or stdin).
    Classify {
        text: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Inspect configuration.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Print version information.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the loaded configuration (secrets redacted) as JSON.
    Show,

    /// Print the resolved configuration file path.
    Path,
}

/// Per-invocation overrides of the `model` config section.
#[derive(Args, Debug, Default, Clone)]
pub struct ModelOverrides {
    /// Bedrock model identifier.
    #[arg(long)]
    pub model: Option<String>,

    /// Maximum tokens to generate.
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature in [0, 1].
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Nucleus sampling probability in [0, 1].
    #[arg(long)]
    pub top_p: Option<f64>,
}

impl ModelOverrides {
    /// Apply the overrides and re-validate.
    pub fn apply(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(ref model) = self.model {
            config.model.id = model.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            config.model.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.model.temperature = temperature;
        }
        if let Some(top_p) = self.top_p {
            config.model.top_p = top_p;
        }
        config.validate()
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Write a generation outcome. Returns `true` if text was produced.
///
/// In text mode a failure goes to `err`; in JSON mode everything goes to `out`.
pub fn write_outcome(
    result: &GenerationResult,
    format: OutputFormat,
    out: &mut impl Write,
    err: &mut impl Write,
) -> std::io::Result<bool> {
    match (result, format) {
        (GenerationResult::Text(text), OutputFormat::Text) => {
            let media = media::classify(text);
            writeln!(out, "Generated text")?;
            writeln!(out, "==============")?;
            writeln!(out, "{}", text)?;
            write_media_lines(&media, out)?;
            Ok(true)
        }
        (GenerationResult::Text(text), OutputFormat::Json) => {
            let media = media::classify(text);
            let value = json!({
                "status": "ok",
                "text": text,
                "media": media,
            });
            writeln!(out, "{}", value)?;
            Ok(true)
        }
        (GenerationResult::Failure(reason), OutputFormat::Text) => {
            writeln!(err, "{}", reason)?;
            Ok(false)
        }
        (GenerationResult::Failure(reason), OutputFormat::Json) => {
            writeln!(out, "{}", json!({"status": "failure", "reason": reason}))?;
            Ok(false)
        }
    }
}

fn write_media_lines(media: &MediaClassification, out: &mut impl Write) -> std::io::Result<()> {
    if media.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    for url in &media.video_links {
        writeln!(out, "video: {}", url)?;
    }
    for url in &media.image_links {
        writeln!(out, "image: {}", url)?;
    }
    Ok(())
}

/// Write a classification on its own.
pub fn write_classification(
    media: &MediaClassification,
    format: OutputFormat,
    out: &mut impl Write,
) -> std::io::Result<()> {
    match format {
        OutputFormat::Text => {
            for url in &media.video_links {
                writeln!(out, "video: {}", url)?;
            }
            for url in &media.image_links {
                writeln!(out, "image: {}", url)?;
            }
            Ok(())
        }
        OutputFormat::Json => writeln!(out, "{}", json!(media)),
    }
}

// ---------------------------------------------------------------------------
// Subcommand handlers
// ---------------------------------------------------------------------------

/// Secrets that should be redacted when printing config.
const SECRET_KEYS: &[&str] = &["accessKeyId", "secretAccessKey", "sessionToken"];

/// Run one generation and render it. Returns `false` when no text was produced.
pub async fn handle_generate<G>(
    generator: &G,
    prompt: &str,
    generation_config: &GenerationConfig,
    format: OutputFormat,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<bool, Box<dyn std::error::Error>>
where
    G: TextGenerator + ?Sized,
{
    match generation::generate(generator, prompt, generation_config).await {
        Ok(result) => Ok(write_outcome(&result, format, out, err)?),
        Err(GenerationError::EmptyPrompt) => {
            writeln!(err, "{}", EMPTY_PROMPT_MESSAGE)?;
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Read prompts line by line until EOF, generating and rendering each.
///
/// Blank lines are reported and skipped. Returns the number of prompts that
/// produced text.
pub async fn run_interactive<G, R>(
    generator: &G,
    generation_config: &GenerationConfig,
    format: OutputFormat,
    input: R,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<usize, Box<dyn std::error::Error>>
where
    G: TextGenerator + ?Sized,
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut succeeded = 0;

    write!(err, "prompt> ")?;
    err.flush()?;
    while let Some(line) = lines.next_line().await? {
        if handle_generate(generator, &line, generation_config, format, out, err).await? {
            succeeded += 1;
        }
        out.flush()?;
        write!(err, "prompt> ")?;
        err.flush()?;
    }
    writeln!(err)?;
    Ok(succeeded)
}

/// Run the `classify` subcommand.
pub fn handle_classify(
    text: &str,
    format: OutputFormat,
    out: &mut impl Write,
) -> std::io::Result<()> {
    write_classification(&media::classify(text), format, out)
}

/// Run the `config show` subcommand.
pub fn handle_config_show(cfg: &Config, out: &mut impl Write) -> Result<(), Box<dyn std::error::Error>> {
    let redacted = redact_secrets(serde_json::to_value(cfg)?);
    writeln!(out, "{}", serde_json::to_string_pretty(&redacted)?)?;
    Ok(())
}

/// Run the `config path` subcommand.
pub fn handle_config_path(explicit: Option<&std::path::Path>, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "{}", config::get_config_path(explicit).display())
}

/// Run the `version` subcommand.
pub fn handle_version(out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))?;
    writeln!(out, "default model: {}", generation::DEFAULT_MODEL_ID)
}

fn redact_secrets(mut value: Value) -> Value {
    match &mut value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if SECRET_KEYS.contains(&key.as_str()) {
                    if child.is_string() {
                        *child = Value::String("***".to_string());
                    }
                } else {
                    *child = redact_secrets(child.take());
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                *item = redact_secrets(item.take());
            }
        }
        _ => {}
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationRequest;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Echoes the prompt back with a fixed suffix, or fails on "fail".
    struct EchoGenerator {
        prompts: Mutex<Vec<String>>,
    }

    impl EchoGenerator {
        fn new() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        fn model_id(&self) -> &str {
            "echo.model-v1"
        }

        async fn invoke(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(request.prompt().to_string());
            if request.prompt() == "fail" {
                return Err(GenerationError::Service {
                    status: 429,
                    code: None,
                    message: "Too many requests".to_string(),
                });
            }
            Ok(format!("{} https://youtube.com/watch?v=1 https://img.example/a.png", request.prompt()))
        }
    }

    fn text(buf: &[u8]) -> String {
        String::from_utf8(buf.to_vec()).unwrap()
    }

    #[test]
    fn test_cli_parses_generate() {
        let cli = Cli::try_parse_from([
            "bedrock-preview",
            "generate",
            "hello",
            "--max-tokens",
            "64",
            "--format",
            "json",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Generate {
                prompt,
                overrides,
                format,
            }) => {
                assert_eq!(prompt, "hello");
                assert_eq!(overrides.max_tokens, Some(64));
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_defaults_to_no_subcommand() {
        let cli = Cli::try_parse_from(["bedrock-preview", "--config", "/tmp/c.json5"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.json5")));
    }

    #[test]
    fn test_overrides_apply_and_validate() {
        let mut cfg = Config::default();
        let overrides = ModelOverrides {
            model: Some("amazon.titan-text-express-v1".to_string()),
            temperature: Some(0.1),
            ..Default::default()
        };
        overrides.apply(&mut cfg).unwrap();
        assert_eq!(cfg.model.id, "amazon.titan-text-express-v1");
        assert_eq!(cfg.model.temperature, 0.1);
        assert_eq!(cfg.model.max_tokens, 512);

        let bad = ModelOverrides {
            top_p: Some(3.0),
            ..Default::default()
        };
        assert!(bad.apply(&mut cfg).is_err());
    }

    #[test]
    fn test_write_outcome_text_mode() {
        let result = GenerationResult::Text("See https://vimeo.com/9 and https://x.io/p.gif".to_string());
        let (mut out, mut err) = (Vec::new(), Vec::new());
        assert!(write_outcome(&result, OutputFormat::Text, &mut out, &mut err).unwrap());
        let out = text(&out);
        assert!(out.contains("See https://vimeo.com/9 and https://x.io/p.gif"));
        assert!(out.contains("video: https://vimeo.com/9"));
        assert!(out.contains("image: https://x.io/p.gif"));
        assert!(err.is_empty());
    }

    #[test]
    fn test_write_outcome_failure_text_mode_goes_to_stderr() {
        let result = GenerationResult::Failure("ERROR: Can't invoke 'm'. Reason: boom".to_string());
        let (mut out, mut err) = (Vec::new(), Vec::new());
        assert!(!write_outcome(&result, OutputFormat::Text, &mut out, &mut err).unwrap());
        assert!(out.is_empty());
        assert_eq!(text(&err), "ERROR: Can't invoke 'm'. Reason: boom\n");
    }

    #[test]
    fn test_write_outcome_json_mode() {
        let result = GenerationResult::Text("https://youtube.com/x".to_string());
        let (mut out, mut err) = (Vec::new(), Vec::new());
        write_outcome(&result, OutputFormat::Json, &mut out, &mut err).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["text"], "https://youtube.com/x");
        assert_eq!(value["media"]["videoLinks"][0], "https://youtube.com/x");

        let failure = GenerationResult::Failure("nope".to_string());
        let mut out = Vec::new();
        write_outcome(&failure, OutputFormat::Json, &mut out, &mut err).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value, json!({"status": "failure", "reason": "nope"}));
    }

    #[test]
    fn test_classify_text_output() {
        let mut out = Vec::new();
        handle_classify(
            "https://a.com/x.jpg https://example.com/page https://vimeo.com/3",
            OutputFormat::Text,
            &mut out,
        )
        .unwrap();
        assert_eq!(text(&out), "video: https://vimeo.com/3\nimage: https://a.com/x.jpg\n");
    }

    #[test]
    fn test_config_show_redacts_secrets() {
        let cfg = config::parse_config(
            r#"{aws: {region: "us-east-1", accessKeyId: "AKIAVISIBLE", secretAccessKey: "hunter2"}}"#,
        )
        .unwrap();
        let mut out = Vec::new();
        handle_config_show(&cfg, &mut out).unwrap();
        let out = text(&out);
        assert!(out.contains("us-east-1"));
        assert!(out.contains("***"));
        assert!(!out.contains("AKIAVISIBLE"));
        assert!(!out.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_generate_empty_prompt_reports_usage_error() {
        let generator = EchoGenerator::new();
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let ok = handle_generate(
            &generator,
            "",
            &GenerationConfig::default(),
            OutputFormat::Text,
            &mut out,
            &mut err,
        )
        .await
        .unwrap();
        assert!(!ok);
        assert_eq!(text(&err), "Please enter a prompt.\n");
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_interactive_session() {
        let generator = EchoGenerator::new();
        let input: &[u8] = b"first\n\nfail\nsecond\n";
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let succeeded = run_interactive(
            &generator,
            &GenerationConfig::default(),
            OutputFormat::Text,
            input,
            &mut out,
            &mut err,
        )
        .await
        .unwrap();

        assert_eq!(succeeded, 2);
        assert_eq!(*generator.prompts.lock().unwrap(), vec!["first", "fail", "second"]);

        let out = text(&out);
        assert_eq!(out.matches("video: https://youtube.com/watch?v=1").count(), 2);
        assert_eq!(out.matches("image: https://img.example/a.png").count(), 2);

        let err = text(&err);
        assert!(err.contains(EMPTY_PROMPT_MESSAGE));
        assert!(err.contains("ERROR: Can't invoke 'echo.model-v1'. Reason: Bedrock API returned 429"));
    }
}
