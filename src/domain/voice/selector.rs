//! Voice Context - 音色挑选
//!
//! 分阶段匹配，任一阶段命中即返回：
//! 1. 已保存的音色名称
//! 2. 地区标签 + 名称提示
//! 3. 地区标签
//! 4. 语言 + 名称提示
//! 5. 语言 + 知名厂商
//! 6. 语言
//! 7. 目录第一项
//!
//! 同一阶段内按名称（忽略大小写）排序，保证相同目录下结果稳定。

use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

use super::{VoiceDescriptor, VoiceError};

/// 命中的匹配阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStage {
    PreferredName,
    RegionWithHint,
    Region,
    LanguageWithHint,
    LanguageWithVendor,
    Language,
    Fallback,
}

impl SelectionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreferredName => "preferred_name",
            Self::RegionWithHint => "region_with_hint",
            Self::Region => "region",
            Self::LanguageWithHint => "language_with_hint",
            Self::LanguageWithVendor => "language_with_vendor",
            Self::Language => "language",
            Self::Fallback => "fallback",
        }
    }
}

/// 名称匹配与兜底之间的各阶段，按优先级排列
const RANKED_STAGES: [SelectionStage; 5] = [
    SelectionStage::RegionWithHint,
    SelectionStage::Region,
    SelectionStage::LanguageWithHint,
    SelectionStage::LanguageWithVendor,
    SelectionStage::Language,
];

/// 挑选结果：对目录条目的引用，不转移所有权
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceMatch<'a> {
    pub voice: &'a VoiceDescriptor,
    pub stage: SelectionStage,
}

/// 单次挑选的查询条件
#[derive(Debug, Clone, Default)]
pub struct VoiceQuery<'a> {
    /// 目标语言（只看主语言部分，如 `es`）
    pub language: &'a str,
    /// 之前保存的音色名称
    pub preferred_name: Option<&'a str>,
}

impl<'a> VoiceQuery<'a> {
    pub fn new(language: &'a str) -> Self {
        Self {
            language,
            preferred_name: None,
        }
    }

    pub fn with_preferred_name(mut self, name: Option<&'a str>) -> Self {
        self.preferred_name = name.filter(|n| !n.trim().is_empty());
        self
    }
}

/// 音色挑选器
#[derive(Debug, Clone)]
pub struct VoiceSelector {
    region_tags: Vec<String>,
    name_hints: Option<Regex>,
    vendor_hints: Option<Regex>,
}

impl VoiceSelector {
    /// - `region_tags`: 优先的地区标签，如 `es-US`、`es-MX`
    /// - `name_hints`: 名称中的地区/性别提示词，如 `United States`、`Estados Unidos`
    /// - `vendor_hints`: 质量较好的厂商名，如 `Google`、`Microsoft`
    pub fn new<S: AsRef<str>>(
        region_tags: &[S],
        name_hints: &[S],
        vendor_hints: &[S],
    ) -> Result<Self, VoiceError> {
        Ok(Self {
            region_tags: region_tags
                .iter()
                .map(|t| t.as_ref().trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            name_hints: build_word_matcher(name_hints)?,
            vendor_hints: build_word_matcher(vendor_hints)?,
        })
    }

    /// 从目录中挑选一个音色；目录为空时返回 `None`
    pub fn select<'a>(
        &self,
        catalog: &'a [VoiceDescriptor],
        query: &VoiceQuery<'_>,
    ) -> Option<VoiceMatch<'a>> {
        let first = catalog.first()?;

        if let Some(name) = query.preferred_name {
            if let Some(voice) = best_by_name(catalog.iter().filter(|v| v.name == name)) {
                return Some(VoiceMatch {
                    voice,
                    stage: SelectionStage::PreferredName,
                });
            }
        }

        for stage in RANKED_STAGES {
            let candidates = catalog
                .iter()
                .filter(|v| self.matches_stage(stage, v, query.language));
            if let Some(voice) = best_by_name(candidates) {
                return Some(VoiceMatch { voice, stage });
            }
        }

        Some(VoiceMatch {
            voice: first,
            stage: SelectionStage::Fallback,
        })
    }

    /// 某语言下全部音色的展示顺序：地区优先，其次知名厂商，最后按名称
    pub fn rank_for_language<'a>(
        &self,
        catalog: &'a [VoiceDescriptor],
        language: &str,
    ) -> Vec<&'a VoiceDescriptor> {
        let mut ranked: Vec<&VoiceDescriptor> =
            catalog.iter().filter(|v| v.speaks(language)).collect();

        ranked.sort_by(|a, b| {
            let regional = |v: &VoiceDescriptor| {
                !(self.is_regional(v, language) || self.has_name_hint(v))
            };
            let vendor = |v: &VoiceDescriptor| !self.is_known_vendor(v);
            regional(*a)
                .cmp(&regional(*b))
                .then_with(|| vendor(*a).cmp(&vendor(*b)))
                .then_with(|| compare_names(a, b))
        });
        ranked
    }

    fn matches_stage(
        &self,
        stage: SelectionStage,
        voice: &VoiceDescriptor,
        language: &str,
    ) -> bool {
        match stage {
            SelectionStage::RegionWithHint => {
                self.is_regional(voice, language) && self.has_name_hint(voice)
            }
            SelectionStage::Region => self.is_regional(voice, language),
            SelectionStage::LanguageWithHint => {
                voice.speaks(language) && self.has_name_hint(voice)
            }
            SelectionStage::LanguageWithVendor => {
                voice.speaks(language) && self.is_known_vendor(voice)
            }
            SelectionStage::Language => voice.speaks(language),
            SelectionStage::PreferredName | SelectionStage::Fallback => false,
        }
    }

    fn is_regional(&self, voice: &VoiceDescriptor, language: &str) -> bool {
        voice.speaks(language)
            && self
                .region_tags
                .iter()
                .filter(|tag| voice.speaks(tag))
                .any(|tag| voice.has_region(tag))
    }

    fn has_name_hint(&self, voice: &VoiceDescriptor) -> bool {
        self.name_hints
            .as_ref()
            .is_some_and(|re| re.is_match(&voice.name))
    }

    fn is_known_vendor(&self, voice: &VoiceDescriptor) -> bool {
        self.vendor_hints.as_ref().is_some_and(|re| {
            re.is_match(&voice.name) || voice.vendor.as_deref().is_some_and(|v| re.is_match(v))
        })
    }
}

/// 提示词按整词、忽略大小写匹配；没有提示词时返回 `None`
fn build_word_matcher<S: AsRef<str>>(hints: &[S]) -> Result<Option<Regex>, VoiceError> {
    let alternatives: Vec<String> = hints
        .iter()
        .map(|h| h.as_ref().trim())
        .filter(|h| !h.is_empty())
        .map(regex::escape)
        .collect();

    if alternatives.is_empty() {
        return Ok(None);
    }

    let pattern = format!(r"\b(?:{})\b", alternatives.join("|"));
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| VoiceError::InvalidHint(e.to_string()))
}

fn compare_names(a: &VoiceDescriptor, b: &VoiceDescriptor) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.lang.cmp(&b.lang))
}

fn best_by_name<'a>(
    candidates: impl Iterator<Item = &'a VoiceDescriptor>,
) -> Option<&'a VoiceDescriptor> {
    candidates.min_by(|a, b| compare_names(a, b))
}
