//! Extraction prompt for vocabulary tables.

use crate::llm::Message;

/// Upper bound on entries requested per image.
pub const MAX_VOCABULARY: usize = 10;

/// Key the model must use for the vocabulary list.
pub const VOCABULARY_KEY: &str = "vocabulary_lst";

/// Wrap OCR markdown in the German instruction block as a single user turn.
pub fn build_messages(ocr_markdown: &str) -> Vec<Message> {
    vec![Message::user_text_part(instruction_text(ocr_markdown))]
}

fn instruction_text(ocr_markdown: &str) -> String {
    format!(
        r#"<AUFGABE>
Der nachfolgende Text wurde aus einem englischen Schulbuch kopiert und in Markdown konvertiert.
Er enthält eine Aufstellung/Liste von englischen Vokabeln, bzw. Phrasen, welche auch mehrere Wörter lang sein können.
In der Regel finden sich die Vokabeln in Tabellenform.
Detail-Anweisungen dazu:
- Wähle aus diesen bitte {max} aus und gib sie im JSON-FORMAT (wichtig!) zurück.
- Denke dir keine Vokabeln aus, verwende nur die, die du als solche in dem Text erkennst.
- Findest du weniger als {max}, gib entsprechend weniger zurück. Fülle nicht mit ausgedachten Vokabeln auf!
- Wenn die Vokabeln aus mehreren Wörtern bestehen, wie z.B. 'wear a school uniform',
  trenne sie nicht, sondern lasse die Phrase als eine Vokabel im Output.

<JSON-ZIEL-FORMAT>
{{"{key}": [{{"english_vocabulary_word_or_phrase1": "translation_to_german1"}},
                    {{"english_vocabulary_word_or_phrase2": "translation_to_german2"}}]}}

<TEXT MIT ENTHALTENEN VOKABELN>
{ocr_markdown}
"#,
        max = MAX_VOCABULARY,
        key = VOCABULARY_KEY,
        ocr_markdown = ocr_markdown,
    )
}
