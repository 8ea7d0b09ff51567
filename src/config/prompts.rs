//! Prompt templates for answer generation.
//!
//! Templates use `{context}`, `{question}` and `{options}` placeholders.

use super::PromptSettings;
use serde::{Deserialize, Serialize};

const DEFAULT_SYSTEM: &str = "\
你是一个专业的金融监管制度问答助手。请根据提供的文档内容回答问题，确保答案准确、合规。\
对于选择题，请分析各个选项，给出正确答案。对于问答题，请提供详细、准确的回答。\
请基于文档内容回答，不要编造信息。";

const DEFAULT_CHOICE_TEMPLATE: &str = "\
你是一名专业的金融监管法规专家，请根据提供的参考资料，准确回答选择题。

参考资料：
{context}

问题：{question}
选项：
{options}

注意：这是不定项选择题，可能有一个或多个正确答案。请仔细分析每个选项，\
说明你的推理过程，引用相关的参考资料内容，然后给出最终答案。

如果是单选题，请直接输出一个选项字母（如A）。
如果是多选题，请输出所有正确选项字母，用逗号分隔（如A,C,D）。

答案：";

const DEFAULT_QA_TEMPLATE: &str = "\
你是一名专业的金融监管法规专家，请根据提供的参考资料，详细回答问题。

参考资料：
{context}

问题：{question}

请基于参考资料，提供准确、详细的回答，包含具体的数字、比例、标准等关键信息。

答案：";

/// Resolved prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompts {
    /// System prompt for the generator.
    pub system: String,
    /// Template for multiple-choice questions.
    pub choice_template: String,
    /// Template for free-text questions.
    pub qa_template: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM.to_string(),
            choice_template: DEFAULT_CHOICE_TEMPLATE.to_string(),
            qa_template: DEFAULT_QA_TEMPLATE.to_string(),
        }
    }
}

impl Prompts {
    /// Build prompts from settings, falling back to defaults per field.
    pub fn from_settings(settings: &PromptSettings) -> Self {
        let defaults = Self::default();
        Self {
            system: settings.system.clone().unwrap_or(defaults.system),
            choice_template: settings
                .choice_template
                .clone()
                .unwrap_or(defaults.choice_template),
            qa_template: settings.qa_template.clone().unwrap_or(defaults.qa_template),
        }
    }

    /// Render the multiple-choice template.
    pub fn render_choice(&self, context: &str, question: &str, options: &str) -> String {
        self.choice_template
            .replace("{context}", context)
            .replace("{question}", question)
            .replace("{options}", options)
    }

    /// Render the free-text template.
    pub fn render_qa(&self, context: &str, question: &str) -> String {
        self.qa_template
            .replace("{context}", context)
            .replace("{question}", question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_placeholders() {
        let prompts = Prompts::default();
        let rendered = prompts.render_choice("某条款", "资本充足率下限是多少？", "A. 8%\nB. 6%");
        assert!(rendered.contains("某条款"));
        assert!(rendered.contains("资本充足率下限是多少？"));
        assert!(rendered.contains("A. 8%"));
        assert!(!rendered.contains("{context}"));
    }

    #[test]
    fn settings_override_only_given_fields() {
        let settings = PromptSettings {
            system: Some("自定义系统提示".to_string()),
            ..Default::default()
        };
        let prompts = Prompts::from_settings(&settings);
        assert_eq!(prompts.system, "自定义系统提示");
        assert!(prompts.qa_template.contains("{question}"));
    }
}
