//! 比价工具：price_comparison
//!
//! 模拟各零售商报价（价格 / 库存 / 运费 / 评分），最优报价取有货中最便宜的一家。

use async_trait::async_trait;
use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::schema::parameters_schema;
use crate::tools::{Tool, ToolCategory, ToolOutput};

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PriceComparisonParams {
    /// Phone model to search for
    #[serde(alias = "query")]
    pub phone_model: Option<String>,
    /// List of retailers to check
    pub retailers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    OutOfStock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shipping {
    Free,
    Paid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetailerQuote {
    pub retailer: String,
    pub price: u32,
    pub availability: Availability,
    pub shipping: Shipping,
    /// 1-5
    pub rating: u8,
}

/// 生成各零售商报价，按价格升序
pub fn quote_prices<R: Rng + ?Sized>(rng: &mut R, retailers: &[String]) -> Vec<RetailerQuote> {
    let mut quotes: Vec<RetailerQuote> = retailers
        .iter()
        .map(|retailer| RetailerQuote {
            retailer: retailer.clone(),
            price: rng.gen_range(200..700),
            availability: if rng.gen::<f64>() > 0.2 {
                Availability::InStock
            } else {
                Availability::OutOfStock
            },
            shipping: if rng.gen::<f64>() > 0.5 {
                Shipping::Free
            } else {
                Shipping::Paid
            },
            rating: rng.gen_range(1..=5),
        })
        .collect();
    quotes.sort_by_key(|q| q.price);
    quotes
}

/// 有货报价中最便宜的一家；全部缺货时为 None
pub fn best_deal(quotes: &[RetailerQuote]) -> Option<&RetailerQuote> {
    quotes
        .iter()
        .filter(|q| q.availability == Availability::InStock)
        .min_by_key(|q| q.price)
}

pub struct PriceComparisonTool {
    default_retailers: Vec<String>,
}

impl PriceComparisonTool {
    pub fn new(default_retailers: Vec<String>) -> Self {
        Self { default_retailers }
    }
}

#[async_trait]
impl Tool for PriceComparisonTool {
    fn name(&self) -> &str {
        "price_comparison"
    }

    fn description(&self) -> &str {
        "Compare prices across multiple retailers"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Api
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<PriceComparisonParams>()
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, String> {
        let params: PriceComparisonParams =
            serde_json::from_value(args).map_err(|e| format!("Invalid parameters: {e}"))?;
        let retailers = params
            .retailers
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| self.default_retailers.clone());

        let quotes = quote_prices(&mut rand::thread_rng(), &retailers);
        let best = best_deal(&quotes).cloned();

        Ok(ToolOutput::new(serde_json::json!({
            "phone_model": params.phone_model,
            "prices": quotes,
            "best_deal": best,
        })))
    }
}
