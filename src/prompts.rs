pub const PROMPT_TEMPLATE: &str = "请将以下英文对话文件翻译成地道的中文，要符合中文表达习惯，准确传达原意。

要求：
1. 保持原文件的格式和结构
2. 每行对话格式为\"说话者: 内容\"
3. 先显示英文原文，然后显示中文翻译，每组对话之间空一行
4. 自动清理已经存在的[tag]标签
5. 翻译要准确、地道、符合中文表达习惯
6. 输出格式示例：

Sally: Hello there!
Sally: 你好！

Pete: How are you?
Pete: 你好吗？

原文件内容：
{content}

翻译结果：";

/// Embeds already-cleaned dialogue into the fixed bilingual instruction block.
pub fn build_prompt(cleaned_content: &str) -> String {
    PROMPT_TEMPLATE.replace("{content}", cleaned_content)
}
