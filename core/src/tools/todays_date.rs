use crate::tools::extract_string_arg_opt;
use crate::traits::Tool;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    IsoDate,
    Day,
    Month,
    Year,
}

impl DateFormat {
    pub const ALL: [DateFormat; 4] = [Self::IsoDate, Self::Day, Self::Month, Self::Year];

    pub fn pattern(self) -> &'static str {
        match self {
            Self::IsoDate => "%Y-%m-%d",
            Self::Day => "%d",
            Self::Month => "%m",
            Self::Year => "%Y",
        }
    }

    pub fn render(self, date: NaiveDate) -> String {
        date.format(self.pattern()).to_string()
    }
}

impl std::str::FromStr for DateFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.pattern() == s)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unsupported date_format '{}'. Options are: {}",
                    s,
                    Self::ALL.map(DateFormat::pattern).join(", ")
                )
            })
    }
}

pub struct TodaysDateTool {
    fixed_date: Option<NaiveDate>,
}

impl Default for TodaysDateTool {
    fn default() -> Self {
        Self::new()
    }
}

impl TodaysDateTool {
    pub fn new() -> Self {
        Self { fixed_date: None }
    }

    /// Always answers with `date` instead of the local clock.
    pub fn fixed(date: NaiveDate) -> Self {
        Self {
            fixed_date: Some(date),
        }
    }

    fn today(&self) -> NaiveDate {
        self.fixed_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

#[async_trait]
impl Tool for TodaysDateTool {
    fn name(&self) -> &str {
        "get_todays_date"
    }

    fn description(&self) -> &str {
        "A tool that returns today's date in the date format requested. Options are: 'YYYY-MM-DD', 'DD', 'MM', 'YYYY'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "date_format": {
                    "type": "string",
                    "enum": DateFormat::ALL.map(DateFormat::pattern),
                    "default": DateFormat::IsoDate.pattern(),
                    "description": "The date format to return today's date in."
                }
            },
            "required": ["date_format"]
        })
    }

    async fn call(&self, args: &serde_json::Value) -> anyhow::Result<String> {
        let requested = extract_string_arg_opt(args, "date_format", DateFormat::IsoDate.pattern());
        let format: DateFormat = requested.parse()?;
        Ok(format.render(self.today()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> TodaysDateTool {
        TodaysDateTool::fixed(NaiveDate::from_ymd_opt(2025, 1, 7).unwrap())
    }

    #[tokio::test]
    async fn renders_each_supported_format() {
        let cases = [
            ("%Y-%m-%d", "2025-01-07"),
            ("%d", "07"),
            ("%m", "01"),
            ("%Y", "2025"),
        ];

        for (format, expected) in cases {
            let output = tool()
                .call(&json!({ "date_format": format }))
                .await
                .unwrap();
            assert_eq!(output, expected, "format {format}");
        }
    }

    #[tokio::test]
    async fn missing_format_uses_iso_date() {
        let output = tool().call(&json!({})).await.unwrap();
        assert_eq!(output, "2025-01-07");
    }

    #[tokio::test]
    async fn unsupported_format_is_an_error() {
        let err = tool()
            .call(&json!({ "date_format": "%H:%M" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported date_format"));
    }

    #[test]
    fn schema_lists_the_four_formats() {
        let schema = tool().parameters_schema();
        assert_eq!(
            schema["properties"]["date_format"]["enum"],
            json!(["%Y-%m-%d", "%d", "%m", "%Y"])
        );
        assert_eq!(schema["required"], json!(["date_format"]));
    }

    #[test]
    fn clock_date_is_used_without_override() {
        let today = chrono::Local::now().date_naive();
        let tool = TodaysDateTool::new();
        // Guard against running exactly across midnight.
        let seen = tool.today();
        assert!(seen == today || seen == today.succ_opt().unwrap());
    }
}
