//! Prompt templates
//!
//! Static prompts are plain constants; prompts with data slots are MiniJinja
//! templates rendered through [`render`].

use crate::error::Result;
use minijinja::Environment;
use serde::Serialize;

/// System prompt for query entity extraction
pub const QUERY_SYSTEM_PROMPT: &str = "\
Get principal entities in JSON format:
- market (str): Principal market
- companies (list): Principal companies
- timeframe (str): Time horizon
- geography (str): Location";

pub const TRENDS_INSTRUCTION: &str =
    "Identify key market trends supported by quantitative and qualitative data";

pub const TRENDS_SCHEMA: &str = r#"Generates a trend analysis in JSON format:
{
    "trends": [{
        "name": str,
        "description": str,
        "evidence": [str],
        "impact_score": float
    }],
    "summary": str
}"#;

pub const COMPETITORS_INSTRUCTION: &str = "\
Analyze key competitors considering:
- Market share
- Competitive advantages
- Recent strategic moves
- key financials";

pub const COMPETITORS_SCHEMA: &str = r#"You are a senior strategic analyst. Return JSON with:
{
    "top_competitors": [{
        "name": str,
        "market_share": float,
        "strengths": [str],
        "weaknesses": [str],
        "recent_activity": [str],
        "key_financials": {str: float}
    }],
    "competitive_landscape": str
}"#;

pub const SWOT_INSTRUCTION: &str = "\
Conduct a detailed SWOT analysis considering:
1. Target market strengths
2. Current weaknesses
3. Emerging opportunities
4. Competitive threats";

pub const SWOT_SCHEMA: &str = r#"Returns SWOT in JSON format:
{
    "strengths": { "description": str, "evidence": [str] },
    "weaknesses": { "description": str, "evidence": [str] },
    "opportunities": { "description": str, "evidence": [str] },
    "threats": { "description": str, "evidence": [str] }
}"#;

/// User message of one analysis chunk call
pub const ANALYSIS_USER_TEMPLATE: &str = "{{ instruction }}\n\nRelevant data:\n{{ chunk }}";

/// Final report prompt
pub const REPORT_TEMPLATE: &str = r"
As a senior strategic director, analyze this market data and generate an executive report in Markdown:

# Required Structure:
## 🎯 Executive Summary (1 paragraph)
- Key market dynamics
- Main strategic opportunities
- Critical risks to mitigate

## 📊 Trend Analysis
- Top 3 disruptive trends
- Sector growth projection
- Relevant emerging technologies

## 🥇 Competitive Landscape
### Comparison Table (Top {{ top_n }})
{{ competitors_table }}

### Strategic Map
- Positioning by market segment
- Key competitive advantages

## 🚀 Strategic Recommendations
- Investment priorities (short/medium term)
- Recommended strategic alliances
- Technological innovations to be developed

## ✅ Action Plan
- Key initiatives for the next 90 days
- Success metrics (KPIs)
- Recommended resource allocation

# Input Data:
{{ input_data }}

# Formatting Instructions:
1. Use executive but concise language
2. Highlight key figures in bold
3. Include a condensed SWOT analysis
4. Prioritize actionable insights
";

/// Input data block of the report prompt
pub const INPUT_DATA_TEMPLATE: &str = r"
### Market Context
- Market: {{ market }}
{%- if companies %}
- Companies of Interest: {{ companies | join(', ') }}
{%- endif %}
- Timeframe: {{ timeframe }}
- Geography: {{ geography }}
- Analysis Date: {{ analysis_date }}
- Data Sources: {{ data_sources | join(', ') }}
- Analysis Quality: {{ quality_score }}/1.0

### Trend Highlights
{{ trends }}

### SWOT Analysis
{{ swot }}
{%- for item in financials %}

#### Key Financials: {{ item.name }}
{{ item.block }}
{%- endfor %}
";

/// Render a template string with the given context
pub fn render<S: Serialize>(template: &str, ctx: S) -> Result<String> {
    let env = Environment::new();
    Ok(env.render_str(template, ctx)?)
}
