use thiserror::Error;

use crate::types::FewShotExample;

pub const CONTRACT_PLACEHOLDER: &str = "[CONTRACT]";
pub const EXAMPLES_SLOT: &str = "{examples}";

pub const DEFAULT_INSTRUCTIONS: &str = r#"
You are a Solidity security auditor. Below are some example smart contracts showing the contract source code and bug type in JSON format.
Each sub-json object is an instance with the following information:
- buggy_contract is the contract code that contains the bug.
- bug_type is the classification result we focus on.
All the information provided can be considered ground truth.
There are only eight bug types: correct, Overflow-Underflow, Re-entrancy, TOD, Timestamp-Dependency, Unchecked-Send, Unhandled-Exceptions, tx.origin.
Use these to educate yourself, and be prepared to give classification results on new contracts.
Those contracts will only have the buggy_contract information when we ask you to classify them.

Chain of Thought Instructions:
To classify a contract, follow these steps:
1. Analyze the contract code structure (e.g., functions, variables, control flow).
2. Identify potential vulnerability patterns (e.g., unchecked calls, timestamp usage, etc.).
3. Compare findings with the known vulnerability types.
4. Conclude with the most likely bug type based on your analysis.

{examples}

Now classify the following contract:
[CONTRACT]

Answer in format: Bug type: [BUG TYPE]
For example, your answer should look like this: Bug type: Re-entrancy
"#;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("template must contain exactly one [CONTRACT] placeholder, found {0}")]
    Placeholder(usize),

    #[error("template must contain exactly one {{examples}} slot, found {0}")]
    ExamplesSlot(usize),

    #[error("failed to serialize few-shot examples: {0}")]
    Examples(#[from] serde_json::Error),
}

/// Few-shot prompt, validated and pre-split around the contract placeholder.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    head: String,
    tail: String,
}

impl PromptTemplate {
    /// Splits `instructions` on its placeholder before embedding the corpus,
    /// so placeholder text inside an example cannot capture the contract.
    pub fn new(instructions: &str, examples: &[FewShotExample]) -> Result<Self, PromptError> {
        let placeholders = instructions.matches(CONTRACT_PLACEHOLDER).count();
        if placeholders != 1 {
            return Err(PromptError::Placeholder(placeholders));
        }
        let slots = instructions.matches(EXAMPLES_SLOT).count();
        if slots != 1 {
            return Err(PromptError::ExamplesSlot(slots));
        }

        let corpus = serde_json::to_string_pretty(examples)?;
        let (head, tail) = instructions
            .split_once(CONTRACT_PLACEHOLDER)
            .ok_or(PromptError::Placeholder(0))?;

        Ok(Self {
            head: head.replacen(EXAMPLES_SLOT, &corpus, 1),
            tail: tail.replacen(EXAMPLES_SLOT, &corpus, 1),
        })
    }

    pub fn build(&self, code: &str) -> String {
        let mut prompt = String::with_capacity(self.head.len() + code.len() + self.tail.len());
        prompt.push_str(&self.head);
        prompt.push_str(code);
        prompt.push_str(&self.tail);
        prompt
    }
}
