use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Cn,
    En,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self { Language::Cn => "cn", Language::En => "en" }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported language: {0}")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cn" | "zh" | "zh-cn" => Ok(Language::Cn),
            "en" | "en-us" => Ok(Language::En),
            other => Err(UnknownLanguage(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StyleLabels {
    pub professional: &'static str,
    pub cyberpunk: &'static str,
    pub vintage: &'static str,
    pub bw: &'static str,
    pub nature: &'static str,
    pub oil: &'static str,
}

/// UI strings for one language. The presentation layer renders these; the
/// orchestrator itself only ever reads `error_generic`.
#[derive(Debug, Clone, Serialize)]
pub struct Translation {
    pub title: &'static str,
    pub subtitle: &'static str,
    pub upload_button: &'static str,
    pub upload_hint: &'static str,
    pub processing: &'static str,
    pub regenerate: &'static str,
    pub download: &'static str,
    pub error_generic: &'static str,
    pub select_photo: &'static str,
    pub styles: StyleLabels,
}

static CN: Translation = Translation {
    title: "AI 智能写真馆",
    subtitle: "上传一张照片，立刻生成 6 种不同风格的高质感写真",
    upload_button: "上传照片",
    upload_hint: "支持 JPG, PNG 格式",
    processing: "正在生成中...",
    regenerate: "重新生成",
    download: "下载",
    error_generic: "生成失败，请重试",
    select_photo: "选择一张人像照片",
    styles: StyleLabels {
        professional: "职业形象",
        cyberpunk: "赛博朋克",
        vintage: "复古胶片",
        bw: "黑白影棚",
        nature: "自然清新",
        oil: "艺术油画",
    },
};

static EN: Translation = Translation {
    title: "AI Portrait Studio",
    subtitle: "Upload one photo, instantly generate 6 high-quality portraits styles",
    upload_button: "Upload Photo",
    upload_hint: "Supports JPG, PNG",
    processing: "Generating...",
    regenerate: "Regenerate",
    download: "Download",
    error_generic: "Generation failed",
    select_photo: "Select a portrait photo",
    styles: StyleLabels {
        professional: "Professional",
        cyberpunk: "Cyberpunk",
        vintage: "Vintage Film",
        bw: "Studio B&W",
        nature: "Nature",
        oil: "Oil Painting",
    },
};

pub fn translation(language: Language) -> &'static Translation {
    match language { Language::Cn => &CN, Language::En => &EN }
}
