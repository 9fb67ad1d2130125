//! Prompt construction for the four oracle operations.
//!
//! Prompts describe the graph vocabulary (object nodes, event nodes,
//! event-object edges), the modality catalog, and the citation and
//! confidence rules; the response shape itself is enforced separately via
//! `response_format` JSON schemas in [`crate::LlmOracle`].

use chrono::{DateTime, Utc};

use scenic_graph::Subgraph;
use scenic_types::Query;

use crate::llm::ChatMessage;
use crate::oracle::{EventCandidate, ObjectCandidate};

/// Half-life, in hours, of the confidence discount the oracle is told to
/// apply to old evidence: an answer resting on evidence `age` hours old
/// should carry confidence at most `2^(-age / half_life)`.
pub const DECAY_HALF_LIFE_HOURS: f64 = 24.0;

const MODALITY_CATALOG: &str = "\
The available answer modalities are:
- node: a JSON list of object node names, e.g. [\"bowl_1\", \"mug_2\"]. One or more names.
- text: the answer in natural language.
- binary: true or false.
- time_point: a timestamp in the format yyyy-mm-dd hh:mm:ss.
- time_interval: 'yyyy-mm-dd hh:mm:ss - yyyy-mm-dd hh:mm:ss' (start - end).
- time_duration: a duration in the form hh:mm:ss.
- position: a 3-D coordinate as a JSON list [x, y, z].";

const GRAPH_LEGEND: &str = "\
The environment is structured as a graph:
- 'object_nodes' represent the objects in the scene. Each has a UNIQUE id and a UNIQUE name, plus a 'caption' describing what the object looks like, a 'location', and the first/last times it was seen.
- 'event_nodes' represent observed events. Each has a UNIQUE id, a 'description' of the observed action, a temporal extent and a 'location'.";

const EDGE_LEGEND: &str = "\
- 'event_object_edges' connect an event ('from_event') to an object involved in it ('to_object'). The 'object_role' describes what the object is doing in the event. E.g. if an edge with object_role \"being picked up by the person\" connects event 12 \"the person picks something up\" to object 'mug_0', then mug_0 is the object being picked up.";

const INVOLVED_LEGEND: &str = "\
- each 'event_node' lists its 'involved_objects': the ids of the objects directly used within the observed event.";

const DISAMBIGUATION_RULE: &str = "\
Important: pay attention to which object id is actually connected to an event. Objects of the same class may exist; only the instance linked to the event is the one the event is about. If the event \"the person cleans the bowl\" involves 'yellow_bowl_0', that does not mean 'white_bowl_0' was cleaned.";

/// The shared preamble: robot persona, graph vocabulary matched to what the
/// context actually carries, and the modality catalog.
fn system_preamble(context_has_edges: bool, context_has_involved: bool) -> String {
    let mut preamble = String::from(
        "You are an assistant robot answering questions about its environment \
         from a graph of past observations.\n",
    );
    preamble.push_str(GRAPH_LEGEND);
    if context_has_involved {
        preamble.push('\n');
        preamble.push_str(INVOLVED_LEGEND);
    }
    if context_has_edges {
        preamble.push('\n');
        preamble.push_str(EDGE_LEGEND);
    }
    preamble.push_str("\n\n");
    preamble.push_str(MODALITY_CATALOG);
    preamble
}

/// Messages for scope extraction (pruning phase 1).
pub fn scope_messages(
    query: &str,
    known_locations: &[String],
    graph_span: Option<(DateTime<Utc>, DateTime<Utc>)>,
    now: DateTime<Utc>,
) -> Vec<ChatMessage> {
    let span = match graph_span {
        Some((first, last)) => format!(
            "The graph covers observations from {} to {}.",
            first.format("%Y-%m-%d %H:%M:%S"),
            last.format("%Y-%m-%d %H:%M:%S")
        ),
        None => "The graph contains no events yet.".to_string(),
    };
    vec![
        ChatMessage::system(format!(
            "You narrow the search scope for a robot's memory queries. The \
             current time is {now}. {span}\n\
             From the query, extract the time range it refers to ('start' and \
             'end' as yyyy-mm-dd hh:mm:ss, or null when the query mentions no \
             time range) and the list of locations to search (a subset of the \
             known locations, or an empty list when the query mentions no \
             location). Do not invent constraints the query does not state.",
            now = now.format("%Y-%m-%d %H:%M:%S"),
        )),
        ChatMessage::user(format!(
            "The known locations are: {known_locations:?}.\nThe query is: {query}\n\
             Return the time range and locations to search."
        )),
    ]
}

/// Messages for relevant-node selection (pruning phase 2).
pub fn selection_messages(
    query: &Query,
    objects: &[ObjectCandidate],
    events: &[EventCandidate],
) -> Vec<ChatMessage> {
    let objects_json = serde_json::to_string(objects).unwrap_or_default();
    let events_json = serde_json::to_string(events).unwrap_or_default();
    vec![
        ChatMessage::system(format!(
            "You select which nodes of a robot's observation graph are worth \
             expanding to answer a query.\n{GRAPH_LEGEND}\n\n\
             Select the minimal set of relevant nodes. For example, for 'what \
             is the color of the mug I drank tea from?' select the tea-drinking \
             event and the mug object nodes; for 'what has happened to the \
             yellow bowl?' select the yellow bowl and explore its history. If \
             the query refers to an entity that does not appear among the \
             candidates, select nothing for that category rather than guessing.\n\
             {DISAMBIGUATION_RULE}"
        )),
        ChatMessage::user(format!(
            "The query is: {query} (answer modality: {modality}).\n\
             Candidate object nodes: {objects_json}\n\
             Candidate event nodes: {events_json}\n\
             Return the ids of the relevant object and event nodes.",
            query = query.text,
            modality = query.modality,
        )),
    ]
}

/// Messages for final answer synthesis over an assembled context.
pub fn answer_messages(query: &Query, context: &Subgraph, now: DateTime<Utc>) -> Vec<ChatMessage> {
    let has_edges = context.edges.is_some();
    let has_involved = context
        .events
        .values()
        .any(|event| event.involved_objects.is_some());
    let subgraph_json = context.to_json_value().to_string();

    let mut system = system_preamble(has_edges, has_involved);
    system.push_str(&format!(
        "\n\nThe current time is {now}.\n\
         The graph does not always contain enough information; when it does \
         not, answer null instead of speculating.\n\
         Report a confidence between 0 and 1. Discount confidence for old \
         evidence: with the newest supporting event {half_life} hours old or \
         more, confidence should drop by half per {half_life} hours of age.\n\
         In the explanation, clearly state which object nodes, event nodes \
         and edges you used, by id, and also list those ids in the cited id \
         fields.\n{DISAMBIGUATION_RULE}",
        now = now.format("%Y-%m-%d %H:%M:%S"),
        half_life = DECAY_HALF_LIFE_HOURS,
    ));

    vec![
        ChatMessage::system(system),
        ChatMessage::user(format!(
            "The query is: {query}\nThe answer modality is: {modality}.\n\
             Here is the graph representing the scene: {subgraph_json}\n\
             Only use the graph above; do not speculate. Answer the query.",
            query = query.text,
            modality = query.modality,
        )),
    ]
}

/// Messages for grading a generated answer against ground truth.
pub fn judge_messages(query: &str, ground_truth: &str, generated: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "You grade a robot's answer to a question against the ground-truth \
             answer. Return an accuracy between 0 and 1: how semantically \
             similar the generated answer is to the ground truth. Judge \
             meaning, not phrasing; a correct answer with different wording \
             scores high, a confident wrong answer scores 0."
                .to_string(),
        ),
        ChatMessage::user(format!(
            "The question was: {query}\nGround-truth answer: {ground_truth}\n\
             Generated answer: {generated}\nGrade the generated answer."
        )),
    ]
}
