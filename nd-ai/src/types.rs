use serde::{Deserialize, Serialize};

/// Fixed category taxonomy understood by the publish target.
///
/// Unknown labels returned by the model are mapped to [`Category::Tech`]
/// rather than surfaced as errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ai,
    #[default]
    Tech,
    Gadgets,
    Software,
    Hardware,
    Internet,
    Security,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Ai,
        Category::Tech,
        Category::Gadgets,
        Category::Software,
        Category::Hardware,
        Category::Internet,
        Category::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ai => "ai",
            Category::Tech => "tech",
            Category::Gadgets => "gadgets",
            Category::Software => "software",
            Category::Hardware => "hardware",
            Category::Internet => "internet",
            Category::Security => "security",
        }
    }

    /// Strict whitelist match on the lowercase label.
    pub fn parse(raw: &str) -> Option<Category> {
        match raw.trim().to_lowercase().as_str() {
            "ai" => Some(Category::Ai),
            "tech" => Some(Category::Tech),
            "gadgets" => Some(Category::Gadgets),
            "software" => Some(Category::Software),
            "hardware" => Some(Category::Hardware),
            "internet" => Some(Category::Internet),
            "security" => Some(Category::Security),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rewrite style applied when generating the primary article.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStyle {
    #[default]
    Journalistic,
    KeepAsIs,
    SeoOptimized,
    Academic,
    Casual,
    Technical,
}

impl ContentStyle {
    pub const ALL: [ContentStyle; 6] = [
        ContentStyle::Journalistic,
        ContentStyle::KeepAsIs,
        ContentStyle::SeoOptimized,
        ContentStyle::Academic,
        ContentStyle::Casual,
        ContentStyle::Technical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStyle::Journalistic => "journalistic",
            ContentStyle::KeepAsIs => "keep_as_is",
            ContentStyle::SeoOptimized => "seo_optimized",
            ContentStyle::Academic => "academic",
            ContentStyle::Casual => "casual",
            ContentStyle::Technical => "technical",
        }
    }

    /// Accepts the canonical label plus the short aliases users type in chat.
    pub fn parse(raw: &str) -> Option<ContentStyle> {
        match raw.trim().to_lowercase().as_str() {
            "journalistic" | "journal" => Some(ContentStyle::Journalistic),
            "keep_as_is" | "keep-as-is" | "keepasis" | "asis" | "original" => {
                Some(ContentStyle::KeepAsIs)
            }
            "seo_optimized" | "seo-optimized" | "seo" => Some(ContentStyle::SeoOptimized),
            "academic" => Some(ContentStyle::Academic),
            "casual" => Some(ContentStyle::Casual),
            "technical" | "tech" => Some(ContentStyle::Technical),
            _ => None,
        }
    }

    /// Prompt fragment describing the tone for this style.
    pub fn instructions(&self) -> &'static str {
        match self {
            ContentStyle::Journalistic => {
                "Write in an engaging, professional journalistic voice for a wide audience. \
                 Lead with the most important facts and build a cohesive narrative with \
                 smooth transitions between paragraphs."
            }
            ContentStyle::KeepAsIs => {
                "Preserve the original structure, tone and voice. Fix only grammar and \
                 obvious formatting problems; do not rewrite or reorder the material."
            }
            ContentStyle::SeoOptimized => {
                "Work relevant keywords in naturally and keep the structure scannable. \
                 Favor descriptive phrasing that performs well in search without reading \
                 like keyword stuffing."
            }
            ContentStyle::Academic => {
                "Write in a formal, scholarly register with precise terminology. Build a \
                 structured, logical argument and examine implications analytically."
            }
            ContentStyle::Casual => {
                "Write in a friendly, conversational tone, like explaining the story to a \
                 friend. Use simple language and keep it approachable throughout."
            }
            ContentStyle::Technical => {
                "Write in a detailed, precise technical register. Use accurate terminology, \
                 explain technical concepts thoroughly and cover specifications in depth."
            }
        }
    }

    /// Approximate target length in words. Zero means keep the source length.
    pub fn target_words(&self) -> usize {
        match self {
            ContentStyle::Journalistic => 500,
            ContentStyle::KeepAsIs => 0,
            ContentStyle::SeoOptimized => 550,
            ContentStyle::Academic => 700,
            ContentStyle::Casual => 400,
            ContentStyle::Technical => 650,
        }
    }
}

impl std::fmt::Display for ContentStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of category detection, including how much to trust it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryDetection {
    pub category: Category,
    pub confidence: f32,
}

/// Article produced for the primary locale.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedArticle {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub category: Category,
    pub word_count: usize,
}

/// Title, body and excerpt rendered in a secondary locale.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedArticle {
    pub title: String,
    pub content: String,
    pub excerpt: String,
}
