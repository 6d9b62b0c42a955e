use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::model::{GradeLevel, LetterGrade, Role};

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "educonnect",
    version,
    about = "EduConnect: school dashboard over a local data directory",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Override a config key, e.g. `--set render.title=Springfield`.
    #[arg(
        long = "set",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start a session.
    Login {
        username: String,
        #[arg(long)]
        role: Role,
        #[arg(long, default_value = "")]
        password: String,
    },
    Logout,
    Whoami,
    /// Show the theme, or set it to light, dark or toggle.
    Theme { mode: Option<String> },
    Student {
        #[command(subcommand)]
        action: StudentCommand,
    },
    Course {
        #[command(subcommand)]
        action: CourseCommand,
    },
    Grade {
        #[command(subcommand)]
        action: GradeCommand,
    },
    /// GPA, average score and distribution, overall or for one student.
    Stats {
        #[arg(long)]
        student: Option<u32>,
    },
    Render(RenderArgs),
    /// Print the collections as JSON.
    Export,
    /// Replace all data with the sample dataset.
    Reset,
}

#[derive(Subcommand, Debug, Clone)]
pub enum StudentCommand {
    Add {
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long = "grade-level")]
        grade_level: GradeLevel,
        /// Defaults to today.
        #[arg(long)]
        enrolled: Option<String>,
    },
    Update {
        id: u32,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long = "grade-level")]
        grade_level: Option<GradeLevel>,
        #[arg(long)]
        enrolled: Option<String>,
    },
    Delete {
        id: u32,
    },
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long = "grade-level")]
        grade_level: Option<GradeLevel>,
    },
    Show {
        id: u32,
    },
    /// Grades recorded for one student.
    Grades {
        id: u32,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum CourseCommand {
    Add {
        name: String,
        #[arg(long)]
        teacher: String,
        #[arg(long, default_value_t = 0)]
        students: u32,
        #[arg(long, default_value = "")]
        description: String,
    },
    Update {
        id: u32,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        teacher: Option<String>,
        #[arg(long)]
        students: Option<u32>,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        id: u32,
    },
    List,
}

#[derive(Subcommand, Debug, Clone)]
pub enum GradeCommand {
    /// Record a grade; replaces an existing one for the same pair.
    Add {
        #[arg(long)]
        student: u32,
        #[arg(long)]
        course: u32,
        #[arg(long, value_parser = parse_letter)]
        letter: LetterGrade,
        #[arg(long)]
        score: u32,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        comments: Option<String>,
    },
    Update {
        #[arg(long)]
        student: u32,
        #[arg(long)]
        course: u32,
        #[arg(long, value_parser = parse_letter)]
        letter: Option<LetterGrade>,
        #[arg(long)]
        score: Option<u32>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long, conflicts_with = "clear_comments")]
        comments: Option<String>,
        #[arg(long = "clear-comments")]
        clear_comments: bool,
    },
    Delete {
        #[arg(long)]
        student: u32,
        #[arg(long)]
        course: u32,
    },
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long)]
        course: Option<u32>,
    },
    /// Letter codes with their score bands and grade points.
    Scale,
}

/// Strict letter parsing; the lenient `From<String>` is only for stored data.
fn parse_letter(raw: &str) -> anyhow::Result<LetterGrade> {
    raw.parse()
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    #[arg(default_value = "dashboard")]
    pub page: String,
    #[arg(long, default_value = "")]
    pub search: String,
    #[arg(long = "grade-level")]
    pub grade_level: Option<GradeLevel>,
    #[arg(long)]
    pub course: Option<u32>,
    /// Highlight a role on the login screen when nobody is logged in.
    #[arg(long)]
    pub role: Option<Role>,
    /// Write to a file instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Only the main body, without the surrounding document.
    #[arg(long)]
    pub fragment: bool,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Command, GlobalCli, GradeCommand, KeyVal, StudentCommand};
    use crate::model::{GradeLevel, LetterGrade, Role};

    #[test]
    fn key_val_requires_equals() {
        let kv: KeyVal = "render.title = Springfield".parse().expect("parse");
        assert_eq!(kv.key, "render.title");
        assert_eq!(kv.value, "Springfield");
        assert!("render.title".parse::<KeyVal>().is_err());
    }

    #[test]
    fn global_flags_work_after_the_subcommand() {
        let cli = GlobalCli::try_parse_from([
            "educonnect",
            "login",
            "alice",
            "--role",
            "student",
            "--password",
            "pw",
            "-vv",
            "--set",
            "student.default_id=2",
        ])
        .expect("parse");
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.overrides.len(), 1);
        match cli.command {
            Command::Login { username, role, .. } => {
                assert_eq!(username, "alice");
                assert_eq!(role, Role::Student);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn typed_arguments_parse_through_from_str() {
        let cli = GlobalCli::try_parse_from([
            "educonnect", "grade", "add", "--student", "1", "--course", "3", "--letter", "a-",
            "--score", "90",
        ])
        .expect("parse");
        match cli.command {
            Command::Grade {
                action: GradeCommand::Add { letter, score, .. },
            } => {
                assert_eq!(letter, LetterGrade::AMinus);
                assert_eq!(score, 90);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = GlobalCli::try_parse_from([
            "educonnect", "student", "list", "--grade-level", "11",
        ])
        .expect("parse");
        assert!(matches!(
            cli.command,
            Command::Student {
                action: StudentCommand::List {
                    grade_level: Some(GradeLevel::Eleventh),
                    ..
                }
            }
        ));

        assert!(
            GlobalCli::try_parse_from(["educonnect", "login", "x", "--role", "janitor"]).is_err()
        );
    }

    #[test]
    fn letter_flag_only_accepts_known_codes() {
        let letter_of = |raw: &str| {
            GlobalCli::try_parse_from([
                "educonnect", "grade", "add", "--student", "1", "--course", "1", "--letter", raw,
                "--score", "85",
            ])
            .map(|cli| match cli.command {
                Command::Grade {
                    action: GradeCommand::Add { letter, .. },
                } => letter,
                other => panic!("unexpected command: {other:?}"),
            })
        };
        assert_eq!(letter_of("b+").expect("lowercase code"), LetterGrade::BPlus);
        assert_eq!(letter_of("A").expect("plain code"), LetterGrade::A);
        assert!(letter_of("Z").is_err());

        let update = GlobalCli::try_parse_from([
            "educonnect", "grade", "update", "--student", "1", "--course", "1", "--letter", "q",
        ]);
        assert!(update.is_err());
    }

    #[test]
    fn grade_scale_and_comment_flags_parse() {
        let cli = GlobalCli::try_parse_from(["educonnect", "grade", "scale"]).expect("parse");
        assert!(matches!(
            cli.command,
            Command::Grade {
                action: GradeCommand::Scale
            }
        ));

        assert!(
            GlobalCli::try_parse_from([
                "educonnect", "grade", "update", "--student", "1", "--course", "1", "--comments",
                "x", "--clear-comments",
            ])
            .is_err()
        );
    }
}
