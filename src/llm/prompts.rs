// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// System message sent with every cleaning request.
pub const CLEANING_SYSTEM_PROMPT: &str = "You are a helpful assistant";

const RAW_TEXT_PLACEHOLDER: &str = "{raw_text}";

const OCR_CLEANING_TEMPLATE: &str = r#"# Role
You are an expert in proofreading and repairing text.

# Task
The text below was extracted from a book by optical character recognition (OCR).
Read it carefully and repair the recognition damage.

# Instructions
1. Fix misrecognised characters, such as 'l' read as '1', 'o' read as '0', or confused CJK characters.
2. Repair the layout:
   - remove line breaks inside paragraphs and join the sentences back together;
   - rejoin words hyphenated across lines;
   - normalise the spacing between paragraphs.
3. Remove running headers, footers, page numbers and other metadata that is not body text.
4. Correct punctuation and capitalisation.
5. Keep the meaning and structure of the original text intact.
6. Answer in Markdown, without wrapping the answer in a ```markdown fence.
7. Output only the cleaned text. Add no explanations or notes.

Text to process:

```text
{raw_text}
```

Output the corrected text."#;

/// User message asking the model to clean OCR output `raw_text`.
pub fn cleaning_prompt(raw_text: &str) -> String {
    OCR_CLEANING_TEMPLATE.replacen(RAW_TEXT_PLACEHOLDER, raw_text, 1)
}
