//! Stable priority queue of completion jobs

use crate::config::PriorityWeights;
use crate::job::{CompletionJob, JobSummary};
use crate::priority::{score, PriorityContext};
use std::collections::VecDeque;

/// Jobs ordered by priority (highest first), then by submission order.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: VecDeque<CompletionJob>,
    next_seq: u64,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn push(&mut self, mut job: CompletionJob) {
        job.seq = self.next_seq;
        self.next_seq += 1;
        self.jobs.push_back(job);
        self.sort();
    }

    /// Recomputes every score under `context` and re-sorts.
    pub fn reprioritize(&mut self, weights: &PriorityWeights, context: &PriorityContext) {
        for job in self.jobs.iter_mut() {
            job.priority = score(weights, context, &job.options);
        }
        self.sort();
    }

    /// Removes the highest-priority job after rescoring under `context`.
    pub fn pop(
        &mut self,
        weights: &PriorityWeights,
        context: &PriorityContext,
    ) -> Option<CompletionJob> {
        self.reprioritize(weights, context);
        self.jobs.pop_front()
    }

    /// Removes every job, in queue order.
    pub fn drain(&mut self) -> Vec<CompletionJob> {
        self.jobs.drain(..).collect()
    }

    pub fn summaries(&self) -> Vec<JobSummary> {
        self.jobs.iter().map(CompletionJob::summary).collect()
    }

    fn sort(&mut self) {
        self.jobs
            .make_contiguous()
            .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priority::LoadOptions;
    use bridge_traits::TrackRecord;

    fn job(page: &str, section: &str, weights: &PriorityWeights, context: &PriorityContext) -> CompletionJob {
        let options = LoadOptions::new(page, section);
        let priority = score(weights, context, &options);
        CompletionJob::new(vec![TrackRecord::new(section)], options, priority, Box::new(|_| {}))
    }

    #[test]
    fn test_pop_highest_first_ties_in_submission_order() {
        let weights = PriorityWeights::default();
        let context = PriorityContext::default();
        let mut queue = JobQueue::new();

        queue.push(job("home", "genres", &weights, &context));
        queue.push(job("home", "forYou", &weights, &context));
        queue.push(job("other", "forYou", &weights, &context));

        let order: Vec<String> = std::iter::from_fn(|| queue.pop(&weights, &context))
            .map(|j| format!("{}/{}", j.options.page, j.options.section))
            .collect();
        assert_eq!(order, vec!["home/forYou", "other/forYou", "home/genres"]);
    }

    #[test]
    fn test_reprioritize_follows_context() {
        let weights = PriorityWeights::default();
        let mut queue = JobQueue::new();
        let empty = PriorityContext::default();

        queue.push(job("home", "forYou", &weights, &empty));
        queue.push(job("search", "search", &weights, &empty));

        let context = PriorityContext::new("search", "search");
        queue.reprioritize(&weights, &context);
        assert_eq!(queue.summaries()[0].page, "search");

        let popped = queue.pop(&weights, &context).unwrap();
        assert_eq!(popped.options.section, "search");
        assert_eq!(queue.len(), 1);
    }
}
