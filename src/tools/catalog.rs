//! 手机目录
//!
//! `PhoneCatalog` 是外部商品库的检索接口。配置了 `tools.catalog_endpoint` 时使用
//! [`HttpCatalog`]（POST `{endpoint}/api/phones/search`），否则使用内置的 [`InMemoryCatalog`]。

use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::core::AgentError;

/// 单次检索最多返回的条数
pub const MAX_SEARCH_LIMIT: usize = 50;
const DEFAULT_SEARCH_LIMIT: usize = 20;

/// 价格档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PriceRange {
    Low,
    Mid,
    High,
}

impl PriceRange {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
        }
    }
}

/// 商品记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phone {
    pub id: String,
    pub brand: String,
    pub display_name: String,
    pub price_range: PriceRange,
    #[serde(default)]
    pub key_features: Vec<String>,
    /// 目标人群标签，如 gaming / gamers / photography
    #[serde(default)]
    pub target_audience: Vec<String>,
}

impl Phone {
    fn searchable_text(&self) -> String {
        let mut text = format!("{} {} {}", self.brand, self.display_name, self.id);
        for tag in self.key_features.iter().chain(&self.target_audience) {
            text.push(' ');
            text.push_str(tag);
        }
        text.to_lowercase()
    }
}

/// 检索条件（也是 phone_database_search 工具的参数）
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PhoneQuery {
    /// Search query for phones
    pub query: Option<String>,
    /// Filter by brand
    pub brand: Option<String>,
    /// Price range filter
    pub price_range: Option<PriceRange>,
    /// Required features
    pub features: Vec<String>,
    /// Maximum results to return
    pub limit: Option<usize>,
}

impl PhoneQuery {
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogPage {
    #[serde(default)]
    pub phones: Vec<Phone>,
    #[serde(default)]
    pub total: usize,
}

#[async_trait]
pub trait PhoneCatalog: Send + Sync {
    async fn search(&self, query: &PhoneQuery) -> Result<CatalogPage, AgentError>;
}

/// 内存目录：按过滤条件筛选，按查询词命中数排序（同分保持目录顺序）
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    phones: Vec<Phone>,
}

impl InMemoryCatalog {
    pub fn new(phones: Vec<Phone>) -> Self {
        Self { phones }
    }

    /// 内置的演示目录
    pub fn seeded() -> Self {
        let phone = |id: &str,
                     brand: &str,
                     name: &str,
                     range: PriceRange,
                     features: &[&str],
                     audience: &[&str]| Phone {
            id: id.to_string(),
            brand: brand.to_string(),
            display_name: name.to_string(),
            price_range: range,
            key_features: features.iter().map(|s| s.to_string()).collect(),
            target_audience: audience.iter().map(|s| s.to_string()).collect(),
        };

        Self::new(vec![
            phone(
                "iphone-15-pro",
                "Apple",
                "iPhone 15 Pro",
                PriceRange::High,
                &["Pro Camera", "A17 Pro", "Titanium Design", "USB-C"],
                &["photography", "business", "professionals"],
            ),
            phone(
                "galaxy-s24-ultra",
                "Samsung",
                "Galaxy S24 Ultra",
                PriceRange::High,
                &["Pro Camera", "S Pen", "200MP Sensor", "Galaxy AI"],
                &["photography", "business", "power_users"],
            ),
            phone(
                "pixel-8",
                "Google",
                "Pixel 8",
                PriceRange::Mid,
                &["Pro Camera", "Tensor G3", "Magic Eraser", "7 Years of Updates"],
                &["photography", "daily_use"],
            ),
            phone(
                "rog-phone-8",
                "Asus",
                "ROG Phone 8",
                PriceRange::High,
                &["165Hz Display", "Snapdragon 8 Gen 3", "AirTrigger", "5500mAh Battery"],
                &["gaming", "gamers"],
            ),
            phone(
                "oneplus-12r",
                "OnePlus",
                "OnePlus 12R",
                PriceRange::Mid,
                &["120Hz Display", "100W Charging", "5500mAh Battery"],
                &["gaming", "gamers", "daily_use"],
            ),
            phone(
                "galaxy-a55",
                "Samsung",
                "Galaxy A55",
                PriceRange::Mid,
                &["AMOLED Display", "IP67", "4 Years of Updates"],
                &["daily_use", "students"],
            ),
            phone(
                "redmi-note-13",
                "Xiaomi",
                "Redmi Note 13",
                PriceRange::Low,
                &["108MP Camera", "AMOLED Display", "33W Charging"],
                &["daily_use", "students", "budget"],
            ),
            phone(
                "moto-g-power",
                "Motorola",
                "Moto G Power",
                PriceRange::Low,
                &["5000mAh Battery", "Headphone Jack"],
                &["daily_use", "seniors", "budget"],
            ),
        ])
    }
}

#[async_trait]
impl PhoneCatalog for InMemoryCatalog {
    async fn search(&self, query: &PhoneQuery) -> Result<CatalogPage, AgentError> {
        let brand = query.brand.as_deref().map(str::to_lowercase);
        let features: Vec<String> = query.features.iter().map(|f| f.to_lowercase()).collect();
        let words: Vec<String> = query
            .query
            .as_deref()
            .unwrap_or_default()
            .to_lowercase()
            .split_whitespace()
            .filter(|w| w.len() > 2)
            .map(str::to_string)
            .collect();

        let mut hits: Vec<(usize, &Phone)> = self
            .phones
            .iter()
            .filter(|p| brand.as_ref().map_or(true, |b| p.brand.to_lowercase() == *b))
            .filter(|p| query.price_range.map_or(true, |r| p.price_range == r))
            .filter(|p| {
                features.iter().all(|f| {
                    p.key_features
                        .iter()
                        .any(|k| k.to_lowercase().contains(f.as_str()))
                })
            })
            .map(|p| {
                let text = p.searchable_text();
                (words.iter().filter(|w| text.contains(w.as_str())).count(), p)
            })
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0));

        let total = hits.len();
        let phones = hits
            .into_iter()
            .take(query.effective_limit())
            .map(|(_, p)| p.clone())
            .collect();
        Ok(CatalogPage { phones, total })
    }
}

/// 外部商品库
pub struct HttpCatalog {
    client: reqwest::Client,
    url: String,
}

impl HttpCatalog {
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AgentError::Catalog(e.to_string()))?;
        Ok(Self {
            client,
            url: format!("{}/api/phones/search", endpoint.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl PhoneCatalog for HttpCatalog {
    async fn search(&self, query: &PhoneQuery) -> Result<CatalogPage, AgentError> {
        let resp = self
            .client
            .post(&self.url)
            .json(query)
            .send()
            .await
            .map_err(|e| AgentError::Catalog(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AgentError::Catalog(format!("{status}: {text}")));
        }

        resp.json::<CatalogPage>()
            .await
            .map_err(|e| AgentError::Catalog(e.to_string()))
    }
}
