//! Czech prompt templates for the hospital assistant.

use ordina_schema::{IntentCategory, Message, MessageRole};

/// Returned when the model produces an empty answer.
pub const FALLBACK_ANSWER: &str = "Omlouvám se, nepodařilo se mi zpracovat váš požadavek.";

pub const ROUTING_SYSTEM_PROMPT: &str = r#"Jsi klasifikátor záměrů uživatele pro virtuálního asistenta FN Brno.

Analyzuj aktuální dotaz uživatele v kontextu historie konverzace a urči záměr. Vrať přesně jednu z těchto kategorií:

KATEGORIE:
1. general_rag - Obecné otázky na znalosti (směrnice, procesy, kontakty, IT, pravidla)
2. conversational - Pozdravy, konverzace, dotazy co umíš (např. "Ahoj", "Jak se máš?", "Co umíš?")
3. trip_request - Uživatel chce PODAT ŽÁDOST o pracovní cestu (před cestou)
4. trip_expense - Uživatel chce VYÚČTOVAT pracovní cestu (po cestě, má účtenky)
5. patient_lookup - Uživatel chce VYHLEDAT PACIENTA podle jména, data narození nebo identifikátoru

PRAVIDLA PRO ROZPOZNÁNÍ PRACOVNÍ CESTY:

trip_request (Žádost o cestu):
- Klíčová slova: "podat žádost", "naplánovat cestu", "chci jet na", "potřebuji zařídit cestu", "Jak zařídit pracovní cestu"
- Kontext: Budoucnost, plánování, ještě nejel, dotazy k postupu okolo služební cesty
- Příklady:
  * "Chci podat žádost o pracovní cestu do Prahy"
  * "Potřebuji jet na konferenci"
  * "Jak podat žádost o pracovní cestu?"
  * "Co potřebuji k tomu, abych mohl jet na služební cestu?"

trip_expense (Vyúčtování cesty):
- Klíčová slova: "vyúčtovat cestu", "vrátit peníze za cestu", "mám účtenky z cesty", "byl jsem na cestě"
- Kontext: Minulost, cesta už proběhla
- Příklady:
  * "Chci vyúčtovat pracovní cestu"
  * "Byl jsem v Praze, mám účtenky, co s nimi?"
  * "Co mám dělat po návratu ze služební cesty?"

PRAVIDLA PRO ROZPOZNÁNÍ VYHLEDÁNÍ PACIENTA:

patient_lookup:
- Klíčová slova: "najdi pacienta", "vyhledej pacienta", "pacient jménem", "pacienti narození"
- Kontext: Dotaz obsahuje jméno, příjmení, datum narození, pohlaví nebo identifikátor pacienta
- Příklady:
  * "Najdi pacienta Jana Nováka"
  * "Vyhledej pacienty narozené v roce 1990"
  * "Pacient s identifikátorem 12345"

UPOZORNĚNÍ:
- Pokud se dotaz ptá "JAK to funguje?" nebo "CO musím udělat?" a nespadá do žádné z ostatních kategorií → general_rag (je to informační dotaz)
- Pokud se uživatel ptá na služební cestu → příslušný formulář (trip_request nebo trip_expense podle kontextu)
- Využij historii k pochopení kontextu (např. po otázce "Jak si zařídit pracovní cestu?" může následovat "Chci jet do Prahy" → trip_request)
- Při nejistotě defaultuj na general_rag

Odpověz POUZE názvem kategorie a ničím jiným."#;

/// Classification user message: current query, with prior user-authored
/// turns when the conversation has any.
pub fn routing_user_message(query: &str, user_history: &str) -> String {
    if user_history.is_empty() {
        format!("Dotaz uživatele: \"{query}\"")
    } else {
        format!(
            "Historie uživatelských dotazů v této konverzaci:\n{user_history}\n\n\
             Aktuální dotaz uživatele: \"{query}\"\n\n\
             Klasifikuj AKTUÁLNÍ dotaz v kontextu historie."
        )
    }
}

pub const BASE_SYSTEM_PROMPT: &str = "Jsi virtuální asistent pro Fakultní nemocnici Brno (FN Brno).
Tvým úkolem je pomáhat zaměstnancům nemocnice s navigací v interních procesech,
organizační struktuře a administrativních úkonech.

PRAVIDLA:
1. Odpovídej jasně, stručně a v češtině.
2. Buď profesionální, ale přátelský.";

const GENERAL_RAG_EXTENSION: &str = "
KONTEXT: K dispozici máš dokumenty z RAG databáze.
- Odpovídej na základě poskytnutého kontextu z dokumentů
- Pokud je to možné, uveď konkrétní oddělení nebo osobu zodpovědnou, na kterou se mohou obrátit
- Poskytuj krok za krokem návod, jak dále postupovat
- Pokud informace není v kontextu, řekni to upřímně a navrhni nejbližší alternativu (možná oddělení, kontakty, obecné postupy)
- Pokud se téma týká helpdesku nebo ho nenajdeš v dokumentech, dej odkaz na helpdesk: https://docs.google.com/forms/d/e/1FAIpQLSeKlyskfuXlPit6OaQfiPoa7yIIkGNavCJIusXkmQvQDj6jMA/viewform . Link vlož jako HTML a tag with an appropriate display name.";

const CONVERSATIONAL_EXTENSION: &str = "
KONTEXT: Uživatel si povídá nebo se ptá na tvoje schopnosti.
- Odpověz přátelsky a profesionálně
- Stručně vysvětli, co umíš (navigace v procesech FN Brno, vyhledávání pacientů)
- Nabídni pomoc s konkrétní otázkou";

const TRIP_REQUEST_EXTENSION: &str = "
KONTEXT: Uživatel chce zjistit více informací o pracovní cestě.
- Poskytni stručné informace o procesu žádosti o pracovní cestu z RAG kontextu
- Vysvětli klíčové požadavky (např. dopravní prostředky, schválení)
- DŮLEŽITÉ: Na konci odpovědi VŽDY uveď:

\"Pro podání žádosti o pracovní cestu můžete použít následující formulář:\"

- Neuvádej link na formulář - zobrazí se automaticky";

const TRIP_EXPENSE_EXTENSION: &str = "
KONTEXT: Uživatel chce VYÚČTOVAT pracovní cestu.
- Poskytni stručné informace o procesu vyúčtování z RAG kontextu
- Vysvětli jaké doklady jsou potřeba (účtenky, potvrzení)
- DŮLEŽITÉ: Na konci odpovědi VŽDY uveď:

\"Pro vyúčtování pracovní cesty můžete použít následující formulář:\"

- Neuvádej link na formulář - formulář se zobrazí automaticky";

const PATIENT_LOOKUP_EXTENSION: &str = "
KONTEXT: Uživatel chce vyhledat pacienta ve FHIR databázi.
- Použij nástroj search_fhir_patients s parametry, které uživatel uvedl
- Nevymýšlej si parametry, které uživatel nezadal
- Výsledek vyhledávání shrň v češtině
- Pokud vyhledávání selže, vysvětli uživateli srozumitelně co se stalo";

fn category_extension(category: IntentCategory) -> &'static str {
    match category {
        IntentCategory::GeneralRag => GENERAL_RAG_EXTENSION,
        IntentCategory::Conversational => CONVERSATIONAL_EXTENSION,
        IntentCategory::TripRequest => TRIP_REQUEST_EXTENSION,
        IntentCategory::TripExpense => TRIP_EXPENSE_EXTENSION,
        IntentCategory::PatientLookup => PATIENT_LOOKUP_EXTENSION,
    }
}

/// Category-specific system prompt, with the conversation history block
/// prepended to the extension when there is any.
pub fn system_prompt(category: IntentCategory, formatted_history: &str) -> String {
    let history_section = if formatted_history.is_empty() {
        String::new()
    } else {
        format!("HISTORIE KONVERZACE:\n{formatted_history}\n\n")
    };
    format!(
        "{BASE_SYSTEM_PROMPT}\n\n{history_section}{}",
        category_extension(category)
    )
}

/// Generation user message, with the retrieved document context when
/// retrieval ran for this turn.
pub fn user_message(query: &str, context: Option<&str>, has_history: bool) -> String {
    match context {
        Some(context) => {
            let history_note = if has_history {
                " a historie konverzace"
            } else {
                ""
            };
            format!(
                "KONTEXT Z DOKUMENTŮ:\n{context}\n\n\
                 OTÁZKA ZAMĚSTNANCE:\n{query}\n\n\
                 Odpověz na otázku zaměstnance na základě výše uvedeného kontextu{history_note}."
            )
        }
        None => {
            let basis = if has_history {
                " na základě historie konverzace"
            } else {
                ""
            };
            format!(
                "OTÁZKA ZAMĚSTNANCE:\n{query}\n\nOdpověz na otázku zaměstnance{basis}."
            )
        }
    }
}

/// Render the last `window` messages as a labelled transcript block.
pub fn format_history(messages: &[Message], window: usize) -> String {
    let start = messages.len().saturating_sub(window);
    messages[start..]
        .iter()
        .map(|m| {
            let label = match m.role {
                MessageRole::User => "Uživatel",
                MessageRole::Assistant => "Asistent",
            };
            format!("[{label}]: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render only user-authored turns, for the classifier.
pub fn format_user_history(messages: &[Message], window: usize) -> String {
    let user_turns: Vec<&Message> = messages
        .iter()
        .filter(|m| m.role == MessageRole::User)
        .collect();
    let start = user_turns.len().saturating_sub(window);
    user_turns[start..]
        .iter()
        .map(|m| format!("- {}", m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
