//! Default prompt texts. `[jobs]` in the config overrides the article and FAQ ones.

pub const DEFAULT_ARTICLE_PROMPT: &str = "This is source info, create a new article in English based on this. \
The article needs to have a couple of H2 headings. Output should be in markdown.";

pub const DEFAULT_ARTICLE_DISCLAIMER: &str = "*Disclaimer : This content is a translation of material \
originally published in Korean by the National Tax Service of the Republic of Korea. While efforts have \
been made to ensure accuracy, this translation is provided for informational purposes only and does not \
carry legal weight. In the event of any discrepancy, the original Korean version shall prevail. Users \
should consult the official Korean documents for precise interpretation. This translation does not \
constitute legal advice. The translators and publishers shall not be held liable for any loss arising \
from reliance on this translation.*";

pub const DEFAULT_FAQ_EXAMPLE: &str = r#"<div itemscope itemtype="https://schema.org/FAQPage">
    <h2> Frequently Asked Questions (FAQ) </h2>
    <div itemscope itemprop="mainEntity" itemtype="https://schema.org/Question">
        <h3 itemprop="name">What is HyalDew Shine?</h3>
        <div itemscope itemprop="acceptedAnswer" itemtype="https://schema.org/Answer">
            <div itemprop="text">
                HyalDew Shine is a skin booster that contains cross-linked Hyaluronic Acid.
                It is used for skin rejuvenation and contains 20 mg/ml of Hyaluronic Acid.
            </div>
        </div>
    </div>
    <div itemscope itemprop="mainEntity" itemtype="https://schema.org/Question">
        <h3 itemprop="name"> What can HyalDew be used for? </h3>
        <div itemscope itemprop="acceptedAnswer" itemtype="https://schema.org/Answer">
            <div itemprop="text">
                HyalDew is a dermal filler for correcting wrinkles, folds, or scars,
                lip augmentation, facial contouring, skin rejuvenation, and improving skin tone.
            </div>
        </div>
    </div>
</div>"#;

pub fn faq_prompt(topic: &str, example: &str) -> String {
    format!(
        "Create 3 frequently asked questions related to {topic} and answer each in 2-3 sentences. \
         Output the result in FAQ Schema Structured data in HTML like the example: {example}"
    )
}

pub fn company_intro_prompt(name: &str, district: &str) -> String {
    format!(
        "Explain the services offered at {name} in {district} in bullet points in English. \
         Put them into service categories and bold the service name at the beginning of the sentence. \
         Explain each service in two sentences. Only use bold for headings. Write a company introduction sentence. \
         Leave out any services where the English procedure name is not commonly known. \
         (Do not use the words 'likely', 'possibly', and any synonyms of those words)"
    )
}
