use crate::schema::{EntityMention, RelationTriple};

pub const CLEAN_SYSTEM: &str =
    "You are a helpful assistant that extracts clean article text from HTML.";
pub const CHECK_SYSTEM: &str = "You are a linguistics expert who judges sentence completeness.";
pub const DECONTEXTUALIZE_SYSTEM: &str =
    "You are a helpful assistant that rewrites sentences so they stand on their own.";
pub const ENTITY_SYSTEM: &str =
    "You are a helpful assistant that extracts named entities from text.";
pub const PARAPHRASE_SYSTEM: &str =
    "You are a helpful assistant that paraphrases text using given entities.";
pub const RELATION_SYSTEM: &str =
    "You are a helpful assistant that extracts relationships between entities.";
pub const VALIDATION_SYSTEM: &str =
    "You are a helpful assistant that validates relationships between entities.";
pub const PROPOSITION_SYSTEM: &str =
    "You are a helpful assistant that writes propositions from given information.";
pub const ATOMIC_FACT_SYSTEM: &str =
    "You are a helpful assistant that extracts atomic facts from given sentences.";

/// The marker the atomic fact prompt asks for when nothing new is found
pub const NO_NEW_FACTS: &str = "No new atomic facts found.";

pub const MAX_ATOMIC_FACTS: usize = 5;

const COMMON_NER_TYPES: &str = r#"Commonly used entity types:
    PER (Person): individuals' names.
    ORG (Organization): companies, institutions, government agencies.
    LOC (Location): geographical entities, cities, countries, addresses.
    DATE (Date): temporal expressions, including specific dates, days of the week, months.
    TIME (Time): time expressions, like specific times, durations.
    MONEY (Money): monetary values, currencies.
    PERCENT (Percentage): numerical values representing percentages.
    GPE (Geopolitical Entity): countries, cities, states. Sometimes overlaps with LOC.
    FAC (Facility): buildings, airports, bridges, highways.
    PROD (Product): names of products.
    EVT (Event): named events like wars, conferences, festivals.
    WOA (Work of Art): titles of books, songs, movies.
    LAW (Law): names of legal documents and acts.
    LANGUAGE (Language): names of languages."#;

pub fn build_clean_prompt(html: &str) -> String {
    format!(
        r#"Objective: Extract the core content of a news article, including the title, publication date, publisher, author, and article body text. The extracted text should be exactly as it appears in the HTML, maintaining punctuation, spacing, and line breaks.

Requirements:
1. Article detection:
   - Set "article_found" to false if no valid article text is present or the content is only a paywall message. Otherwise set it to true.
2. Output a JSON object with the fields:
   article_found: bool
   title: string
   publication_date: string
   author: string
   publisher: string
   body_text: string

HTML Content:
{}"#,
        html
    )
}

pub fn build_check_prompt(chunk: &str) -> String {
    format!(
        r#"Determine whether the provided text is a complete, grammatically correct sentence.
Set "complete" to true or false. When it is not complete, give a brief explanation; otherwise leave "explanation" empty.

Text: "{}""#,
        chunk
    )
}

pub fn build_decontextualize_prompt(previous: &[String], current: &str) -> String {
    format!(
        r#"Instruction:
Rewrite the sentence below by resolving all entity coreferences with the preceding sentences from the document.
- Resolve all inter-sentence pronoun references.
- Make sure that all pronouns in the sentence refer to some named entity within the same sentence.
- Explicitly mention entity names wherever necessary to remove ambiguity.
- For each entity, use only the one most informative name.
- Preserve the meaning of the sentence. Do not add facts.
- Return the rewritten sentence in the "sentence" field and nothing else.

## Example 1:

### Previous sentences from Document:
Elon Musk, the CEO of Tesla, highlighted the company's commitment to innovation and sustainability.
He announced that the new Tesla Model Z would set new standards in electric vehicles.

### Current sentence:
He said it will be available for purchase early next year.

### Output:
Elon Musk said the Tesla Model Z will be available for purchase early next year.

---

## Example 2:

### Previous sentences from Document:
António Guterres, the UN Secretary-General, urged immediate action to combat global warming.
He emphasized the importance of global cooperation.

### Current sentence:
He warned that delay could lead to irreversible damage.

### Output:
António Guterres warned that delay in addressing climate change could lead to irreversible damage.

---

Now rewrite the following:

### Previous sentences from Document:
{}

### Current sentence:
{}

### Output:"#,
        previous.join("\n"),
        current
    )
}

pub fn build_entity_prompt(sentence: &str) -> String {
    format!(
        r#"Read the text carefully and extract the named entities it mentions.
Use the short form of the common entity types below, but add new types when none fit.

<common_ner>
{}
</common_ner>

<text>{}</text>"#,
        COMMON_NER_TYPES, sentence
    )
}

/// Entities rendered as `"text:TYPE"` for the paraphrase prompt
pub fn render_entities(entities: &[EntityMention]) -> String {
    let items: Vec<String> = entities
        .iter()
        .map(|e| format!("\"{}:{}\"", e.entity, e.entity_type))
        .collect();
    format!("[{}]", items.join(", "))
}

pub fn build_paraphrase_prompt(sentence: &str, entities: &[EntityMention]) -> String {
    format!(
        r#"Paraphrase the given text using the given entities. Keep every entity and keep the meaning; change the wording and structure.

Positive examples:
1. Original Text: "Apple Inc. unveiled its latest iPhone at a keynote event held in Cupertino, California." Entities: ["Apple Inc.:Org", "iPhone:Product", "Cupertino:Loc", "California:Loc"] Paraphrased Text: "At an event in Cupertino, California, Apple Inc. introduced the new iPhone."
2. Original Text: "The World Health Organization (WHO) issued a warning about the spread of the Zika virus in South America." Entities: ["World Health Organization:Org", "Zika virus:Disease", "South America:Loc"] Paraphrased Text: "The WHO cautioned about Zika virus transmission in South America."
3. Original Text: "Elon Musk, the CEO of Tesla, announced plans to build a Gigafactory in Nevada." Entities: ["Elon Musk:Per", "Tesla:Org", "Gigafactory:Product", "Nevada:Loc"] Paraphrased Text: "Tesla's CEO, Elon Musk, revealed intentions to establish a Gigafactory in Nevada."

Negative examples (avoid these):
1. Original Text: "The cat sat on the mat." Entities: ["cat:Animal", "mat:Object"] Paraphrased Text: "The animal was positioned upon the object." Loses the simplicity and clarity of the original.
2. Original Text: "She went to the store to buy some milk." Entities: ["store:Loc", "milk:Product"] Paraphrased Text: "She visited the location for the purpose of acquiring the product." Overly verbose and formal.
3. Original Text: "The sun was shining brightly in the sky." Entities: ["sun:Celestial Body", "sky:Loc"] Paraphrased Text: "The celestial body radiated luminosity within the expanse of the location." Needlessly scientific.

Original Text: {}
Entities: {}"#,
        sentence,
        render_entities(entities)
    )
}

pub fn build_relation_prompt(subject: &str, object: &str, sentence: &str) -> String {
    format!(
        r#"Identify the relationship between "{}" and "{}" in the text: "{}".
Possible relationships include Lives In, Works For, and Located In, but use whatever short label fits best.
If the text states no relationship between them, return an empty "relation"."#,
        subject, object, sentence
    )
}

pub fn build_validation_prompt(triple: &RelationTriple, paraphrased: &str) -> String {
    format!(
        r#"In the paraphrased text: "{}", is the relationship "{} {} {}" correct?
Set "is_valid" to true only if the paraphrased text supports it."#,
        paraphrased, triple.subject, triple.relation, triple.object
    )
}

pub fn build_proposition_prompt(triple: &RelationTriple, sentence: &str) -> String {
    format!(
        r#"Create a clear and standalone proposition using the following information:

1. Entity 1: {subject}
2. Relation: {relation}
3. Entity 2: {object}
4. Sentence: "{sentence}"

The proposition should:
- Focus on describing the relationship between {subject} and {object}.
- Only in cases of possible confusion, use relevant details from the sentence that add clarity, specificity, or context to the relationship. Prefer to keep the proposition short and general.
- Be a concise and self-contained statement that conveys all essential information for understanding this relationship."#,
        subject = triple.subject,
        relation = triple.relation,
        object = triple.object,
        sentence = sentence,
    )
}

pub fn build_atomic_fact_prompt(sentence: &str, propositions: &[String]) -> String {
    let propositions = serde_json::to_string(propositions).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"Instructions:

1. Carefully analyze the sentence and the provided propositions.
2. Extract atomic facts that convey new, distinct pieces of information NOT already present in the propositions.
3. Express each atomic fact as a concise and grammatically correct sentence.
4. Ensure each atomic fact is complete and doesn't depend on information outside the given sentence.
5. Avoid generating redundant or overlapping facts, both amongst themselves and with the propositions.
6. If the sentence contains no additional factual information beyond what's in the propositions, return the single fact "{}"
7. Limit the number of atomic facts to a maximum of {}.

Sentence: "{}"
Propositions: {}"#,
        NO_NEW_FACTS, MAX_ATOMIC_FACTS, sentence, propositions
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decontextualize_prompt_keeps_context_order() {
        let previous = vec!["Musk leads Tesla.".to_string(), "He unveiled a car.".to_string()];
        let prompt = build_decontextualize_prompt(&previous, "It will ship next year.");

        let tail = &prompt[prompt.rfind("Now rewrite").unwrap()..];
        let first = tail.find("Musk leads Tesla.").unwrap();
        let second = tail.find("He unveiled a car.").unwrap();
        let current = tail.find("It will ship next year.").unwrap();
        assert!(first < second && second < current);
    }

    #[test]
    fn test_render_entities() {
        let entities = vec![EntityMention::new("Tesla", "ORG"), EntityMention::new("Musk", "PER")];
        assert_eq!(render_entities(&entities), r#"["Tesla:ORG", "Musk:PER"]"#);
    }

    #[test]
    fn test_relation_prompt_names_pair_in_order() {
        let prompt = build_relation_prompt("Elon Musk", "Tesla", "Elon Musk leads Tesla.");
        assert!(prompt.contains(r#"between "Elon Musk" and "Tesla""#));
    }
}
