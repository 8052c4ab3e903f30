/*!
 * Scripted completion services for the integration tests
 *
 * Every helper answers from the ids listed in the prompt, so the same mock
 * works for any batch the loop sends.
 */

use gapfill::errors::ProviderError;
use gapfill::providers::mock::MockCompletion;
use std::collections::HashSet;

/// Translates every id except `unusable`, whose entries come last with empty text
pub fn never_translates(unusable: &[u64]) -> MockCompletion {
    let unusable: HashSet<u64> = unusable.iter().copied().collect();
    MockCompletion::new(move |prompt| {
        let ids = MockCompletion::prompt_ids(prompt);
        let good: Vec<u64> = ids.iter().copied().filter(|id| !unusable.contains(id)).collect();
        let mut response = MockCompletion::well_formed_response(&good);
        for id in ids.iter().filter(|id| unusable.contains(id)) {
            response.push_str(&format!("\n{}:", id));
        }
        Ok(response)
    })
}

/// Answers only the first `limit` ids of every prompt, like a truncated completion
pub fn truncating(limit: usize) -> MockCompletion {
    MockCompletion::new(move |prompt| {
        let ids = MockCompletion::prompt_ids(prompt);
        let answered: Vec<u64> = ids.into_iter().take(limit).collect();
        Ok(format!("Sure! Here are the translations:\n\n{}", MockCompletion::well_formed_response(&answered)))
    })
}

/// Answers every id, but in reverse order
pub fn reversing() -> MockCompletion {
    MockCompletion::new(|prompt| {
        let mut ids = MockCompletion::prompt_ids(prompt);
        ids.reverse();
        Ok(MockCompletion::well_formed_response(&ids))
    })
}

/// Fails permanently whenever the prompt contains `poisoned`
pub fn rejecting_batches_with(poisoned: u64) -> MockCompletion {
    MockCompletion::new(move |prompt| {
        let ids = MockCompletion::prompt_ids(prompt);
        if ids.contains(&poisoned) {
            Err(ProviderError::ApiError {
                status_code: 400,
                message: "content rejected".to_string(),
            })
        } else {
            Ok(MockCompletion::well_formed_response(&ids))
        }
    })
}
