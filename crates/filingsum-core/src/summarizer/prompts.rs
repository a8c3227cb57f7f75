//! Prompt templates

use super::SummaryFocus;

const ANALYST_ROLE: &str = "You are a meticulous financial analyst.";

fn focus_guidance(focus: SummaryFocus) -> &'static str {
    match focus {
        SummaryFocus::Comprehensive => {
            "Cover key financial metrics and trends, business performance, risk factors, \
             management strategy and the future outlook."
        }
        SummaryFocus::Brief => {
            "Keep it short: the key financial highlights, the most significant business \
             developments and the critical risks."
        }
        SummaryFocus::Risks => {
            "Focus on risk factors: competitive, regulatory, market, financial and \
             operational threats and how management addresses them."
        }
        SummaryFocus::Financial => {
            "Focus exclusively on financial performance: revenue and profitability trends, \
             cash flow and liquidity, debt levels and key ratios."
        }
    }
}

/// Prompt for summarizing one chunk on its own
pub fn map_prompt(entity: &str, chunk: &str, focus: SummaryFocus) -> String {
    format!(
        "{ANALYST_ROLE} The following is one section of a larger financial report for the \
         company {entity}. Summarize this specific section concisely, keeping its key points, \
         figures and strategic insights. {guidance} Do not add introductions or conclusions.\n\n\
         DOCUMENT SECTION:\n---\n{chunk}\n---\n\n\
         CONCISE SUMMARY OF THIS SECTION:",
        guidance = focus_guidance(focus),
    )
}

/// Prompt for folding one more chunk into an existing summary
pub fn refine_prompt(entity: &str, chunk: &str, existing: &str, focus: SummaryFocus) -> String {
    format!(
        "{ANALYST_ROLE} You have an existing summary of the previous parts of a financial \
         report for {entity}. Refine and enrich it with relevant information from the next \
         section of the document, integrating new key points into the existing narrative \
         instead of listing them. {guidance} If the new section adds nothing of value, return \
         the existing summary unchanged.\n\n\
         EXISTING SUMMARY:\n---\n{existing}\n---\n\n\
         NEW DOCUMENT SECTION:\n---\n{chunk}\n---\n\n\
         IMPROVED AND REFINED SUMMARY:",
        guidance = focus_guidance(focus),
    )
}

/// Prompt for combining labelled partial summaries into one report
pub fn synthesis_prompt(entity: &str, labelled: &str, focus: SummaryFocus) -> String {
    format!(
        "You are a lead financial analyst. You have been given concise summaries of sequential \
         parts of a financial report for {entity}. Synthesize them into a single, \
         well-structured and coherent final report. Identify the main themes and connect the \
         key data points. {guidance} Do not just list the summaries; write one flowing \
         narrative.\n\n\
         INDIVIDUAL SUMMARIES:\n---\n{labelled}\n---\n\n\
         FINAL SYNTHESIZED REPORT:",
        guidance = focus_guidance(focus),
    )
}
