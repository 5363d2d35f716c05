//! Assistant and Tool Registry
//!
//! The console hosts a small call-center style set of assistants. The session
//! starts with the generic assistant, whose only tools hand the conversation
//! over to a specialist. A hand-off is answered with a `session.update` that
//! swaps in the specialist's instructions and tools; every other tool is
//! answered with a `function_call_output` carrying canned data.

use openai_realtime_types::{ClientEvent, Item, SessionConfig, ToolDefinition};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

/// The assistants a conversation can be handed to. The tool that hands over
/// to an assistant carries the assistant's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assistant {
    Generic,
    Banking,
    Mobile,
}

impl Assistant {
    pub const ALL: [Assistant; 3] = [Assistant::Generic, Assistant::Banking, Assistant::Mobile];

    pub fn tool_name(&self) -> &'static str {
        match self {
            Assistant::Generic => "Generic_Assistant",
            Assistant::Banking => "Banking_Assistant",
            Assistant::Mobile => "Mobile_Assistant",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.tool_name() == name)
    }

    fn hand_off_description(&self) -> &'static str {
        match self {
            Assistant::Generic => {
                "Hand the customer back to the general assistant when the request is not about banking or mobile service."
            }
            Assistant::Banking => {
                "Hand the customer to the banking assistant for account balances and recent transactions."
            }
            Assistant::Mobile => {
                "Hand the customer to the mobile assistant for data usage and mobile plans."
            }
        }
    }

    fn persona(&self) -> &'static str {
        match self {
            Assistant::Generic => {
                "You are a friendly call-center assistant. Greet the customer, find out what they need, and hand them to the right specialist using your tools. Do not answer banking or mobile questions yourself."
            }
            Assistant::Banking => {
                "You are a banking assistant. Help the customer with account balances and recent transactions using your tools. Never invent account data."
            }
            Assistant::Mobile => {
                "You are a mobile service assistant. Help the customer with data usage and choosing a mobile plan using your tools."
            }
        }
    }
}

// --- Tool Arguments ---

/// Arguments of every hand-off tool.
#[derive(Deserialize, JsonSchema, Debug, Default)]
pub struct HandOffArgs {
    /// One sentence describing what the customer needs.
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct AccountBalanceArgs {
    #[schemars(description = "The account to look up: 'checking' or 'savings'")]
    pub account_type: String,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct RecentTransactionsArgs {
    #[schemars(description = "The account to look up: 'checking' or 'savings'")]
    pub account_type: String,
    #[schemars(description = "How many transactions to return, newest first (1-5, default 3)")]
    #[serde(default)]
    pub count: Option<u32>,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct DataUsageArgs {
    #[schemars(description = "The phone number of the line, digits with optional separators")]
    pub phone_number: String,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct MobilePlansArgs {
    #[schemars(description = "Only list plans up to this monthly price in USD")]
    #[serde(default)]
    pub max_price: Option<f32>,
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("invalid arguments for '{tool}': {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Rejected(String),
}

/// What a tool call resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    HandOff(Assistant),
    Output(serde_json::Value),
}

#[derive(Serialize, Clone, Copy)]
struct Transaction {
    date: &'static str,
    description: &'static str,
    amount: f64,
}

#[derive(Serialize, Clone, Copy)]
struct MobilePlan {
    name: &'static str,
    monthly_price: f32,
    data_gb: Option<u32>,
}

const TRANSACTIONS: [Transaction; 5] = [
    Transaction {
        date: "2024-10-28",
        description: "Grocery Mart",
        amount: -84.12,
    },
    Transaction {
        date: "2024-10-27",
        description: "Payroll deposit",
        amount: 2150.00,
    },
    Transaction {
        date: "2024-10-25",
        description: "City Utilities",
        amount: -121.40,
    },
    Transaction {
        date: "2024-10-24",
        description: "Coffee Corner",
        amount: -4.75,
    },
    Transaction {
        date: "2024-10-22",
        description: "Online Books",
        amount: -32.99,
    },
];

const MOBILE_PLANS: [MobilePlan; 3] = [
    MobilePlan {
        name: "Basic 5",
        monthly_price: 20.0,
        data_gb: Some(5),
    },
    MobilePlan {
        name: "Plus 25",
        monthly_price: 35.0,
        data_gb: Some(25),
    },
    MobilePlan {
        name: "Unlimited Plus",
        monthly_price: 55.0,
        data_gb: None,
    },
];

/// Resolves assistant configuration and tool calls for the selected language.
#[derive(Debug, Clone)]
pub struct AssistantService {
    pub language: String,
}

impl Default for AssistantService {
    fn default() -> Self {
        Self {
            language: "English".to_string(),
        }
    }
}

impl AssistantService {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    /// System instructions and tool declarations of the generic assistant.
    pub fn create_generic_assistant_config(&self) -> (String, Vec<ToolDefinition>) {
        self.assistant_config(Assistant::Generic)
    }

    pub fn assistant_config(&self, assistant: Assistant) -> (String, Vec<ToolDefinition>) {
        (self.instructions(assistant), tools_for(assistant))
    }

    fn instructions(&self, assistant: Assistant) -> String {
        format!(
            "{}\nAlways speak and respond in {}. Keep answers short: they are read aloud.",
            assistant.persona(),
            self.language
        )
    }

    /// Answers one tool call.
    ///
    /// Returns the `session.update` of a hand-off, or a
    /// `conversation.item.create` with the call's output. Unknown tools and
    /// bad arguments are reported back to the model as an `{"error": ...}`
    /// output so the conversation can continue.
    pub fn get_tool_response(&self, name: &str, arguments: &str, call_id: &str) -> ClientEvent {
        match self.resolve(name, arguments) {
            Ok(ToolOutcome::HandOff(assistant)) => {
                info!(tool = name, "Handing conversation to assistant");
                let (instructions, tools) = self.assistant_config(assistant);
                ClientEvent::SessionUpdate {
                    session: SessionConfig {
                        instructions: Some(instructions),
                        tools: Some(tools),
                        ..Default::default()
                    },
                }
            }
            Ok(ToolOutcome::Output(value)) => {
                info!(tool = name, call_id, "Tool call answered");
                ClientEvent::item_create(Item::function_call_output(call_id, value.to_string()))
            }
            Err(e) => {
                warn!(tool = name, call_id, error = %e, "Tool call failed");
                let output = json!({ "error": e.to_string() });
                ClientEvent::item_create(Item::function_call_output(call_id, output.to_string()))
            }
        }
    }

    pub fn resolve(&self, name: &str, arguments: &str) -> Result<ToolOutcome, ToolError> {
        if let Some(assistant) = Assistant::from_tool_name(name) {
            let _args: HandOffArgs = parse_args(name, arguments)?;
            return Ok(ToolOutcome::HandOff(assistant));
        }
        let output = match name {
            "get_account_balance" => {
                let args: AccountBalanceArgs = parse_args(name, arguments)?;
                let balance = match normalize_account(&args.account_type)? {
                    "checking" => 2431.18,
                    _ => 12870.00,
                };
                json!({
                    "account_type": normalize_account(&args.account_type)?,
                    "balance": balance,
                    "currency": "USD"
                })
            }
            "get_recent_transactions" => {
                let args: RecentTransactionsArgs = parse_args(name, arguments)?;
                let account = normalize_account(&args.account_type)?;
                let count = args.count.unwrap_or(3).clamp(1, TRANSACTIONS.len() as u32) as usize;
                json!({
                    "account_type": account,
                    "transactions": &TRANSACTIONS[..count]
                })
            }
            "check_data_usage" => {
                let args: DataUsageArgs = parse_args(name, arguments)?;
                let digits: String = args
                    .phone_number
                    .chars()
                    .filter(|c| c.is_ascii_digit())
                    .collect();
                if digits.len() < 7 {
                    return Err(ToolError::Rejected(format!(
                        "'{}' is not a valid phone number",
                        args.phone_number
                    )));
                }
                json!({
                    "phone_number": digits,
                    "plan": "Plus 25",
                    "used_gb": 18.4,
                    "limit_gb": 25,
                    "billing_cycle_ends": "2024-11-30"
                })
            }
            "get_mobile_plans" => {
                let args: MobilePlansArgs = parse_args(name, arguments)?;
                let plans: Vec<MobilePlan> = MOBILE_PLANS
                    .iter()
                    .copied()
                    .filter(|p| args.max_price.is_none_or(|max| p.monthly_price <= max))
                    .collect();
                json!({ "plans": plans })
            }
            _ => return Err(ToolError::UnknownTool(name.to_string())),
        };
        Ok(ToolOutcome::Output(output))
    }
}

fn normalize_account(account_type: &str) -> Result<&'static str, ToolError> {
    match account_type.trim().to_lowercase().as_str() {
        "checking" | "current" => Ok("checking"),
        "savings" | "saving" => Ok("savings"),
        other => Err(ToolError::Rejected(format!(
            "no '{}' account; use 'checking' or 'savings'",
            other
        ))),
    }
}

/// Parses tool arguments; an empty argument string counts as `{}`.
fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, arguments: &str) -> Result<T, ToolError> {
    let arguments = if arguments.trim().is_empty() {
        "{}"
    } else {
        arguments
    };
    serde_json::from_str(arguments).map_err(|source| ToolError::InvalidArguments {
        tool: tool.to_string(),
        source,
    })
}

fn function_tool<T: JsonSchema>(name: &str, description: &str) -> ToolDefinition {
    let mut parameters = serde_json::to_value(schemars::schema_for!(T))
        .unwrap_or_else(|_| json!({ "type": "object" }));
    if let Some(schema) = parameters.as_object_mut() {
        schema.remove("$schema");
        schema.remove("title");
    }
    ToolDefinition::Function {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

fn hand_off_tool(target: Assistant) -> ToolDefinition {
    function_tool::<HandOffArgs>(target.tool_name(), target.hand_off_description())
}

fn tools_for(assistant: Assistant) -> Vec<ToolDefinition> {
    match assistant {
        Assistant::Generic => vec![
            hand_off_tool(Assistant::Banking),
            hand_off_tool(Assistant::Mobile),
        ],
        Assistant::Banking => vec![
            function_tool::<AccountBalanceArgs>(
                "get_account_balance",
                "Get the current balance of one of the customer's accounts.",
            ),
            function_tool::<RecentTransactionsArgs>(
                "get_recent_transactions",
                "List the most recent transactions of one of the customer's accounts.",
            ),
            hand_off_tool(Assistant::Mobile),
            hand_off_tool(Assistant::Generic),
        ],
        Assistant::Mobile => vec![
            function_tool::<DataUsageArgs>(
                "check_data_usage",
                "Check how much mobile data a line has used in the current billing cycle.",
            ),
            function_tool::<MobilePlansArgs>(
                "get_mobile_plans",
                "List the available mobile plans with their monthly prices.",
            ),
            hand_off_tool(Assistant::Banking),
            hand_off_tool(Assistant::Generic),
        ],
    }
}
