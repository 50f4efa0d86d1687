//! Transcoder invocation.
//!
//! The bridge never interprets codec or segmenting options; it only launches
//! whatever [`TranscoderCommand`] it is handed. [`TranscoderConfig`] is the
//! usual way to build one for an ffmpeg-style segmenting encoder.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SupervisorError;

/// A fully resolved command line for the transcoder subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscoderCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl TranscoderCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl fmt::Display for TranscoderCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Output path template with one printf-style `%d`, `%Nd`, or `%0Nd`
/// segment index.
///
/// Padding follows printf: `%0Nd` pads with zeros, `%Nd` with spaces.
/// `%%` stands for a literal percent sign. Segment files are numbered from 0
/// upwards by the transcoder, e.g. `output_%03d.mp4` gives `output_000.mp4`,
/// `output_001.mp4`, and so on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SegmentTemplate {
    template: String,
    prefix: String,
    suffix: String,
    width: usize,
    zero_pad: bool,
}

impl SegmentTemplate {
    pub fn parse(template: impl Into<String>) -> Result<Self, SupervisorError> {
        let template = template.into();
        let invalid = |reason: &str| SupervisorError::InvalidTemplate {
            template: template.clone(),
            reason: reason.to_string(),
        };

        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut width = None;
        let mut zero_pad = false;
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            let out = if width.is_some() { &mut suffix } else { &mut prefix };
            if c != '%' {
                out.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                out.push('%');
                continue;
            }

            let mut digits = String::new();
            while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(d);
                chars.next();
            }
            if chars.next() != Some('d') {
                return Err(invalid("only %d, %Nd and %0Nd placeholders are supported"));
            }
            if width.is_some() {
                return Err(invalid("more than one segment index placeholder"));
            }
            let parsed = if digits.is_empty() {
                0
            } else {
                digits
                    .parse::<usize>()
                    .map_err(|_| invalid("placeholder width is not a number"))?
            };
            zero_pad = digits.starts_with('0');
            width = Some(parsed);
        }

        let width = width.ok_or_else(|| invalid("missing segment index placeholder"))?;
        Ok(Self {
            template,
            prefix,
            suffix,
            width,
            zero_pad,
        })
    }

    /// Path of the segment with the given index.
    pub fn render(&self, index: u64) -> PathBuf {
        let index = if self.zero_pad {
            format!("{index:0width$}", width = self.width)
        } else {
            format!("{index:>width$}", width = self.width)
        };
        PathBuf::from(format!("{}{}{}", self.prefix, index, self.suffix))
    }

    /// Directory the segments are written to, if the template names one.
    pub fn directory(&self) -> Option<&Path> {
        Path::new(&self.prefix)
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}

impl TryFrom<String> for SegmentTemplate {
    type Error = SupervisorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SegmentTemplate> for String {
    fn from(value: SegmentTemplate) -> Self {
        value.template
    }
}

impl fmt::Display for SegmentTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

/// Settings for an ffmpeg-compatible segmenting encoder fed on stdin.
///
/// Every field has a default, so a JSON config file only needs the values
/// it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranscoderConfig {
    /// Encoder executable.
    pub program: String,
    /// Container/format of the frames on stdin.
    pub input_format: String,
    /// Video codec name.
    pub codec: String,
    /// Codec-specific tuning flags, passed after the codec.
    pub codec_args: Vec<String>,
    /// Target bitrate, e.g. `2M`.
    pub bitrate: String,
    /// Length of each output segment in seconds.
    pub segment_seconds: u32,
    /// Decoder thread count; `None` lets the encoder decide.
    pub threads: Option<u32>,
    /// Stamp frames with arrival time instead of a fixed rate.
    pub wallclock_timestamps: bool,
    /// Encoder log level.
    pub log_level: String,
    /// Output path template.
    pub output: SegmentTemplate,
    /// Extra arguments inserted before the output path.
    pub extra_args: Vec<String>,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            input_format: "mjpeg".to_string(),
            codec: "libx264".to_string(),
            codec_args: vec![
                "-preset".to_string(),
                "veryfast".to_string(),
                "-tune".to_string(),
                "zerolatency".to_string(),
            ],
            bitrate: "2M".to_string(),
            segment_seconds: 10,
            threads: Some(4),
            wallclock_timestamps: true,
            log_level: "info".to_string(),
            output: SegmentTemplate {
                template: "output/output_%03d.mp4".to_string(),
                prefix: "output/output_".to_string(),
                suffix: ".mp4".to_string(),
                width: 3,
                zero_pad: true,
            },
            extra_args: Vec::new(),
        }
    }
}

impl TranscoderConfig {
    /// Load a config from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SupervisorError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| SupervisorError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|err| SupervisorError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// Resolve the full command line.
    pub fn command(&self) -> TranscoderCommand {
        let mut command = TranscoderCommand::new(&self.program).args([
            "-hide_banner",
            "-loglevel",
            self.log_level.as_str(),
        ]);
        if let Some(threads) = self.threads {
            command = command.args(["-threads".to_string(), threads.to_string()]);
        }
        if self.wallclock_timestamps {
            command = command.args(["-use_wallclock_as_timestamps", "1"]);
        }
        command
            .args(["-f", self.input_format.as_str(), "-i", "pipe:0"])
            .args(["-c:v", self.codec.as_str()])
            .args(self.codec_args.iter().cloned())
            .args(["-b:v", self.bitrate.as_str()])
            .args(["-f", "segment", "-segment_time"])
            .arg(self.segment_seconds.to_string())
            .args(["-reset_timestamps", "1"])
            .args(self.extra_args.iter().cloned())
            .arg(self.output.as_str())
    }

    /// Create the segment output directory if the template names one.
    pub fn prepare_output(&self) -> Result<(), SupervisorError> {
        if let Some(dir) = self.output.directory() {
            std::fs::create_dir_all(dir).map_err(|source| SupervisorError::OutputDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_renders_zero_padded_indices() {
        let template = SegmentTemplate::parse("out/output_%03d.mp4").unwrap();
        assert_eq!(template.render(0), PathBuf::from("out/output_000.mp4"));
        assert_eq!(template.render(7), PathBuf::from("out/output_007.mp4"));
        assert_eq!(template.render(1234), PathBuf::from("out/output_1234.mp4"));
        assert_eq!(template.directory(), Some(Path::new("out")));
    }

    #[test]
    fn template_width_without_zero_flag_pads_with_spaces() {
        let template = SegmentTemplate::parse("seg_%3d.ts").unwrap();
        assert_eq!(template.render(7), PathBuf::from("seg_  7.ts"));
        assert_eq!(template.render(4567), PathBuf::from("seg_4567.ts"));
        assert_ne!(template, SegmentTemplate::parse("seg_%03d.ts").unwrap());
    }

    #[test]
    fn template_plain_and_escaped_percent() {
        let template = SegmentTemplate::parse("100%%_seg%d.ts").unwrap();
        assert_eq!(template.render(12), PathBuf::from("100%_seg12.ts"));
        assert_eq!(template.directory(), None);
    }

    #[test]
    fn template_rejects_bad_placeholders() {
        for bad in ["no-index.mp4", "a_%03d_%03d.mp4", "seg_%s.mp4", "seg_%03x.mp4"] {
            let err = SegmentTemplate::parse(bad).unwrap_err();
            assert!(
                matches!(err, SupervisorError::InvalidTemplate { .. }),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn default_template_matches_parsed_form() {
        let parsed = SegmentTemplate::parse("output/output_%03d.mp4").unwrap();
        assert_eq!(TranscoderConfig::default().output, parsed);
    }

    #[test]
    fn default_command_reads_stdin_and_segments() {
        let command = TranscoderConfig::default().command();
        assert_eq!(command.program, "ffmpeg");

        let line = command.args.join(" ");
        assert!(line.contains("-f mjpeg -i pipe:0"));
        assert!(line.contains("-c:v libx264 -preset veryfast"));
        assert!(line.contains("-b:v 2M"));
        assert!(line.contains("-f segment -segment_time 10 -reset_timestamps 1"));
        assert_eq!(command.args.last().map(String::as_str), Some("output/output_%03d.mp4"));
    }

    #[test]
    fn optional_flags_are_omitted() {
        let config = TranscoderConfig {
            threads: None,
            wallclock_timestamps: false,
            ..TranscoderConfig::default()
        };
        let command = config.command();
        assert!(!command.args.iter().any(|a| a == "-threads"));
        assert!(!command.args.iter().any(|a| a == "-use_wallclock_as_timestamps"));
    }

    #[test]
    fn config_json_overrides_selected_fields() {
        let config: TranscoderConfig = serde_json::from_str(
            r#"{
                "codec": "h264_nvenc",
                "codec_args": ["-preset", "p1", "-tune", "ll", "-rc", "cbr"],
                "output": "clips/cam_%05d.mp4"
            }"#,
        )
        .unwrap();

        assert_eq!(config.codec, "h264_nvenc");
        assert_eq!(config.bitrate, "2M");
        assert_eq!(config.output.render(3), PathBuf::from("clips/cam_00003.mp4"));
    }

    #[test]
    fn config_json_rejects_unknown_fields_and_bad_templates() {
        assert!(serde_json::from_str::<TranscoderConfig>(r#"{"codek": "x"}"#).is_err());
        assert!(serde_json::from_str::<TranscoderConfig>(r#"{"output": "flat.mp4"}"#).is_err());
    }

    #[test]
    fn command_display_quotes_whitespace() {
        let command = TranscoderCommand::new("ffmpeg").args(["-i", "pipe:0", "my clips/out_%d.mp4"]);
        assert_eq!(
            command.to_string(),
            "ffmpeg -i pipe:0 \"my clips/out_%d.mp4\""
        );
    }

    #[test]
    fn prepare_output_creates_directory() {
        let dir = std::env::temp_dir().join(format!(
            "framerelay-segments-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        let template = format!("{}/nested/seg_%03d.mp4", dir.display());
        let config = TranscoderConfig {
            output: SegmentTemplate::parse(template).unwrap(),
            ..TranscoderConfig::default()
        };

        config.prepare_output().unwrap();
        assert!(dir.join("nested").is_dir());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
