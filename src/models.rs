// src/models.rs

use serde::{Deserialize, Serialize};

//------------------------------------------------------------------------------
// SENTINEL
//------------------------------------------------------------------------------

/// Reserved cost meaning "no observation on this line". Inside a cost-sensitive
/// label stream the same value on the last action marks the end of a decision
/// point for the base learner.
pub const COST_SENTINEL: f32 = f32::MAX;

/// Probability carried by the single cost entry of a shared-context header.
pub const HEADER_PROBABILITY: f32 = -1.0;

/// Cost-sensitive `x` given to a leading shared header.
pub const HEADER_ESTIMATE: f32 = -1.0;

/// True for the sentinel and anything larger (`+inf` included).
pub fn is_sentinel(cost: f32) -> bool {
    cost >= COST_SENTINEL
}

//------------------------------------------------------------------------------
// BANDIT LABEL
//------------------------------------------------------------------------------

/// One `action:cost:probability` entry of a bandit label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CbClass {
    /// Id of the action this entry talks about
    pub action: u32,

    /// Observed cost, or `COST_SENTINEL` when nothing was observed
    #[serde(default = "sentinel_cost")]
    pub cost: f32,

    /// Propensity the logging policy chose `action` with; -1 flags a header
    #[serde(default)]
    pub probability: f32,

    /// Score written back by the base learner, reported in raw mode
    #[serde(default)]
    pub partial_prediction: f32,
}

fn sentinel_cost() -> f32 {
    COST_SENTINEL
}

impl CbClass {
    pub fn new(action: u32, cost: f32, probability: f32) -> Self {
        Self {
            action,
            cost,
            probability,
            partial_prediction: 0.0,
        }
    }

    /// A cost was observed for this action if it is not the sentinel and was
    /// chosen with non-zero probability.
    pub fn is_observed(&self) -> bool {
        !is_sentinel(self.cost) && self.probability > 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CbLabel {
    #[serde(default)]
    pub costs: Vec<CbClass>,
}

impl CbLabel {
    pub fn new(costs: Vec<CbClass>) -> Self {
        Self { costs }
    }

    /// Label of a shared-context header line.
    pub fn shared() -> Self {
        Self {
            costs: vec![CbClass::new(0, COST_SENTINEL, HEADER_PROBABILITY)],
        }
    }

    /// A line is test-only when none of its entries carries an observation.
    pub fn is_test(&self) -> bool {
        !self.costs.iter().any(CbClass::is_observed)
    }

    pub fn is_header(&self) -> bool {
        self.costs.len() == 1 && self.costs[0].probability == HEADER_PROBABILITY
    }

    /// The single cost entry of this line if it is not the sentinel.
    pub fn single_cost(&self) -> Option<&CbClass> {
        match self.costs.as_slice() {
            [only] if !is_sentinel(only.cost) => Some(only),
            _ => None,
        }
    }

    pub fn observed_cost(&self) -> Option<&CbClass> {
        self.costs.iter().find(|c| c.is_observed())
    }
}

//------------------------------------------------------------------------------
// COST-SENSITIVE LABEL
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CsClass {
    pub class_index: u32,
    /// Estimated cost of `class_index`; `COST_SENTINEL` ends the decision point
    pub x: f32,
    pub partial_prediction: f32,
    pub wap_value: f32,
}

impl CsClass {
    pub fn new(class_index: u32, x: f32) -> Self {
        Self {
            class_index,
            x,
            partial_prediction: 0.0,
            wap_value: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsLabel {
    pub costs: Vec<CsClass>,
}

impl CsLabel {
    /// True when this label closes a decision point.
    pub fn ends_sequence(&self) -> bool {
        self.costs.first().map_or(false, |c| is_sentinel(c.x))
    }
}

/// The label slot of an action. Outside a learner call it always holds the
/// bandit label; the adapter swaps in the cost-sensitive view for the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Label {
    Bandit(CbLabel),
    CostSensitive(CsLabel),
}

impl Default for Label {
    fn default() -> Self {
        Label::Bandit(CbLabel::default())
    }
}

//------------------------------------------------------------------------------
// ACTION
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub index: u64,
    pub value: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Chosen class/action id
    pub multiclass: u32,
}

/// One line of a decision point: a candidate action (or a shared header, or a
/// blank terminator) with its features and label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub features: Vec<Feature>,

    #[serde(default)]
    pub label: Label,

    #[serde(default, skip_deserializing)]
    pub prediction: Prediction,

    #[serde(default)]
    pub tag: String,

    /// Cleared once the action has been disposed
    #[serde(skip, default = "in_use_default")]
    pub in_use: bool,
}

fn in_use_default() -> bool {
    true
}

impl Action {
    pub fn new(features: Vec<Feature>, label: CbLabel) -> Self {
        Self {
            features,
            label: Label::Bandit(label),
            prediction: Prediction::default(),
            tag: String::new(),
            in_use: true,
        }
    }

    /// The blank line that terminates a decision point.
    pub fn newline() -> Self {
        Self::new(Vec::new(), CbLabel::default())
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn is_newline(&self) -> bool {
        self.features.is_empty()
    }

    /// The bandit label. An action whose slot currently holds the
    /// cost-sensitive view is mid-call and reports as unlabeled.
    pub fn cb_label(&self) -> Option<&CbLabel> {
        match &self.label {
            Label::Bandit(ld) => Some(ld),
            Label::CostSensitive(_) => None,
        }
    }

    pub fn cs_label(&self) -> Option<&CsLabel> {
        match &self.label {
            Label::CostSensitive(ld) => Some(ld),
            Label::Bandit(_) => None,
        }
    }

    pub fn cs_label_mut(&mut self) -> Option<&mut CsLabel> {
        match &mut self.label {
            Label::CostSensitive(ld) => Some(ld),
            Label::Bandit(_) => None,
        }
    }

    pub fn is_test(&self) -> bool {
        self.cb_label().map_or(true, CbLabel::is_test)
    }

    pub fn is_header(&self) -> bool {
        self.cb_label().map_or(false, CbLabel::is_header)
    }
}

//------------------------------------------------------------------------------
// ARENA
//------------------------------------------------------------------------------

/// Stable handle to an action living in an `ActionArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionHandle(pub usize);

/// Slab of actions. Released slots are reused by later inserts, so a handle is
/// only meaningful until it is released.
#[derive(Debug, Default)]
pub struct ActionArena {
    slots: Vec<Option<Action>>,
    free: Vec<usize>,
}

impl ActionArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mut action: Action) -> ActionHandle {
        action.in_use = true;
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(action);
                ActionHandle(idx)
            }
            None => {
                self.slots.push(Some(action));
                ActionHandle(self.slots.len() - 1)
            }
        }
    }

    pub fn get(&self, handle: ActionHandle) -> Option<&Action> {
        self.slots.get(handle.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, handle: ActionHandle) -> Option<&mut Action> {
        self.slots.get_mut(handle.0).and_then(Option::as_mut)
    }

    pub fn contains(&self, handle: ActionHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Dispose of an action, returning it with `in_use` cleared.
    pub fn release(&mut self, handle: ActionHandle) -> Option<Action> {
        let mut action = self.slots.get_mut(handle.0)?.take()?;
        action.in_use = false;
        self.free.push(handle.0);
        Some(action)
    }

    /// Number of live actions.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
