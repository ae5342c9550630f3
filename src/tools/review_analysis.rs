//! 评论分析工具：review_analysis（模拟评分、情感分布与话题）

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::schema::parameters_schema;
use crate::tools::{Tool, ToolCategory, ToolOutput};

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReviewAnalysisParams {
    /// Phone ID to analyze
    #[serde(alias = "query")]
    pub phone_id: Option<String>,
    /// Include sentiment analysis
    pub sentiment_analysis: bool,
}

/// 生成一份模拟评论分析
pub fn synthesize_analysis<R: Rng + ?Sized>(rng: &mut R, with_sentiment: bool) -> Value {
    let mut analysis = json!({
        "overall_rating": rng.gen_range(3.0..5.0),
        "total_reviews": rng.gen_range(100..5100),
        "key_topics": [
            { "topic": "camera_quality", "sentiment": "positive", "mentions": 234 },
            { "topic": "battery_life", "sentiment": "mixed", "mentions": 189 },
            { "topic": "build_quality", "sentiment": "positive", "mentions": 156 },
            { "topic": "performance", "sentiment": "positive", "mentions": 298 },
        ],
        "pros": ["Great camera", "Fast performance", "Nice design"],
        "cons": ["Expensive", "Battery could be better", "No headphone jack"],
    });
    if with_sentiment {
        analysis["sentiment"] = json!({
            "positive": rng.gen_range(0.4..0.8),
            "neutral": rng.gen_range(0.1..0.4),
            "negative": rng.gen_range(0.05..0.25),
        });
    }
    analysis
}

pub struct ReviewAnalysisTool;

#[async_trait]
impl Tool for ReviewAnalysisTool {
    fn name(&self) -> &str {
        "review_analysis"
    }

    fn description(&self) -> &str {
        "Analyze customer reviews and ratings for phones"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Api
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<ReviewAnalysisParams>()
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, String> {
        let params: ReviewAnalysisParams =
            serde_json::from_value(args).map_err(|e| format!("Invalid parameters: {e}"))?;
        // 模板任务常以空参数调用，此时视为开启情感分析
        let with_sentiment = params.sentiment_analysis || params.phone_id.is_none();
        let analysis = synthesize_analysis(&mut rand::thread_rng(), with_sentiment);

        Ok(ToolOutput::new(analysis).with_metadata(json!({
            "phone_id": params.phone_id,
            "analysis_date": Utc::now().to_rfc3339(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_ranges() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            let analysis = synthesize_analysis(&mut rng, true);
            let rating = analysis["overall_rating"].as_f64().unwrap();
            assert!((3.0..5.0).contains(&rating));
            let positive = analysis["sentiment"]["positive"].as_f64().unwrap();
            assert!((0.4..0.8).contains(&positive));
        }
    }

    #[tokio::test]
    async fn test_sentiment_omitted_when_not_requested() {
        let output = ReviewAnalysisTool
            .execute(json!({"phone_id": "pixel-8"}))
            .await
            .unwrap();
        assert!(output.data.get("sentiment").is_none());
        assert_eq!(output.metadata.unwrap()["phone_id"], "pixel-8");
    }
}
