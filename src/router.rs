//! Loop decision for the generate → validate cycle.

/// Next step after a validation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
  GenerateQuestions,
  End,
}

impl Route {
  pub fn as_str(&self) -> &'static str {
    match self {
      Route::GenerateQuestions => "generate_questions",
      Route::End => "end",
    }
  }
}

/// Counters the router looks at. Nothing else in the run influences the decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteInput {
  pub retry_count: u32,
  pub max_retries: u32,
  pub requested_count: usize,
  pub accepted: usize,
  pub target: usize,
}

/// Pure: identical inputs always give the same route.
///
/// The retry ceiling wins over everything else, so a run that hits it ends
/// with whatever was accepted so far.
pub fn route(input: RouteInput) -> Route {
  if input.retry_count >= input.max_retries {
    return Route::End;
  }
  if input.requested_count == 0 && input.accepted >= input.target {
    return Route::End;
  }
  Route::GenerateQuestions
}
