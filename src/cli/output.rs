use std::fmt::Display;

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Renders `value` for the terminal; human output uses its `Display` impl.
    pub fn render<T>(self, value: &T) -> Result<String>
    where
        T: Serialize + Display,
    {
        Ok(match self {
            OutputFormat::Human => value.to_string(),
            OutputFormat::Json => serde_json::to_string_pretty(value)?,
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Serialize)]
    struct Sample {
        name: &'static str,
    }

    impl fmt::Display for Sample {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "sample {}", self.name)
        }
    }

    #[test]
    fn formats_render_the_same_value() {
        let sample = Sample { name: "a" };
        assert_eq!(OutputFormat::Human.render(&sample).unwrap(), "sample a");
        assert!(OutputFormat::Json.render(&sample).unwrap().contains("\"name\": \"a\""));
        assert_eq!(OutputFormat::Yaml.render(&sample).unwrap(), "name: a\n");
    }
}
