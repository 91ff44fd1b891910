//! Voice Context - Value Objects

use serde::{Deserialize, Serialize};

/// 语音引擎枚举出的音色条目
///
/// 音色目录由宿主环境拥有，本模块只做排序和挑选，不修改条目。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    /// 显示名称（同时用作偏好设置里保存的音色标识）
    pub name: String,
    /// BCP 47 语言标签，如 `es-US`、`es_MX`
    pub lang: String,
    /// 厂商提示（部分引擎单独提供，否则只能从名称中识别）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
}

impl VoiceDescriptor {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            vendor: None,
        }
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }

    /// 语言标签的主语言部分，如 `es-MX` -> `es`
    pub fn language(&self) -> &str {
        primary_subtag(&self.lang)
    }

    /// 主语言是否匹配（忽略大小写与地区）
    pub fn speaks(&self, language: &str) -> bool {
        !language.is_empty() && self.language().eq_ignore_ascii_case(primary_subtag(language))
    }

    /// 完整地区标签是否匹配，`es-US`、`es_us`、`esUS` 视为相同
    pub fn has_region(&self, region_tag: &str) -> bool {
        let wanted = canonical_tag(region_tag);
        !wanted.is_empty() && canonical_tag(&self.lang) == wanted
    }
}

impl std::fmt::Display for VoiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.lang)
    }
}

fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or_default()
}

fn canonical_tag(tag: &str) -> String {
    tag.chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}
