//! Argument consumption plans.
//!
//! Encoding and decoding run in two phases. [`ConsumptionPlan::build`] walks
//! the type tree once and records, for every leaf, which contiguous range of
//! argument slots it owns and what kind each slot must be. The engine then
//! walks the tree again and hands each leaf exactly its slice.
//!
//! A generic (`any`) position may instead be filled by a single
//! [`Arg::Value`] slot carrying a complete nested value. That layout depends
//! on the arguments, so [`plan`] builds against them.

use crate::args::{Arg, ArgList, SlotKind};
use crate::error::{PathSegment, Result, TypeError, TypePath};
use crate::spec::TypeSpec;

/// Slots owned by one leaf of a type tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedLeaf {
    pub path: TypePath,
    pub type_name: &'static str,
    /// Index of the first slot.
    pub offset: usize,
    pub kinds: Vec<SlotKind>,
}

impl PlannedLeaf {
    /// Number of slots.
    pub fn count(&self) -> usize {
        self.kinds.len()
    }

    /// Slot index range within the argument list.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.kinds.len()
    }
}

/// Leaf-by-leaf slot layout of a type, in walk order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumptionPlan {
    leaves: Vec<PlannedLeaf>,
    total: usize,
}

impl ConsumptionPlan {
    /// Lay out the slots of `spec`. Fails with `Uninitialized` if the tree
    /// contains an empty generic slot.
    pub fn build(spec: &TypeSpec) -> Result<Self> {
        Self::layout(spec, None)
    }

    /// Lay out the slots of `spec` as filled by `args`: generic positions
    /// whose next slot is an [`Arg::Value`] take that one slot.
    pub fn build_for(spec: &TypeSpec, args: &ArgList) -> Result<Self> {
        Self::layout(spec, Some(args))
    }

    fn layout(spec: &TypeSpec, args: Option<&ArgList>) -> Result<Self> {
        let mut plan = Self::default();
        let mut path = Vec::new();
        plan.visit(spec, &mut path, args)?;
        Ok(plan)
    }

    fn visit(
        &mut self,
        spec: &TypeSpec,
        path: &mut Vec<PathSegment>,
        args: Option<&ArgList>,
    ) -> Result<()> {
        if let TypeSpec::Any(inner) = spec {
            if let Some(Arg::Value(_)) = args.and_then(|args| args.get(self.total)) {
                self.push_leaf(path, spec.type_name(), vec![SlotKind::Value]);
                return Ok(());
            }
            if let Some(inner) = inner {
                return self.visit(inner, path, args);
            }
        }
        match spec.leaf_slots()? {
            Some(kinds) => {
                self.push_leaf(path, spec.type_name(), kinds);
                Ok(())
            }
            None => {
                for (segment, child) in spec.children() {
                    path.push(segment.clone());
                    let visited = self.visit(child, path, args);
                    path.pop();
                    visited.map_err(|err| err.within(segment))?;
                }
                Ok(())
            }
        }
    }

    fn push_leaf(&mut self, path: &[PathSegment], type_name: &'static str, kinds: Vec<SlotKind>) {
        let mut leaf_path = TypePath::root();
        for segment in path.iter().rev() {
            leaf_path.prepend(segment.clone());
        }
        let offset = self.total;
        self.total += kinds.len();
        self.leaves.push(PlannedLeaf {
            path: leaf_path,
            type_name,
            offset,
            kinds,
        });
    }

    /// Total number of slots.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn leaves(&self) -> &[PlannedLeaf] {
        &self.leaves
    }

    /// Check that `args` has exactly the planned number and kinds of slots.
    pub fn check(&self, args: &ArgList) -> Result<()> {
        if args.len() != self.total {
            return Err(TypeError::ArgCount {
                expected: self.total,
                found: args.len(),
            });
        }
        for leaf in &self.leaves {
            for (index, expected) in leaf.range().zip(&leaf.kinds) {
                let found = args[index].kind();
                if found != *expected {
                    return Err(TypeError::SlotKind {
                        index,
                        expected: *expected,
                        found,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Build the plan for `spec` and check `args` against it.
pub fn plan(spec: &TypeSpec, args: &ArgList) -> Result<ConsumptionPlan> {
    let plan = ConsumptionPlan::build_for(spec, args)?;
    plan.check(args)?;
    Ok(plan)
}

/// Cursor over a plan's leaves, used by tree walks that mirror
/// [`ConsumptionPlan::build`].
pub(crate) struct LeafCursor<'p> {
    leaves: std::slice::Iter<'p, PlannedLeaf>,
}

impl<'p> LeafCursor<'p> {
    pub(crate) fn new(plan: &'p ConsumptionPlan) -> Self {
        Self {
            leaves: plan.leaves.iter(),
        }
    }

    /// Whether the next leaf is a nested value filling a generic position.
    pub(crate) fn at_value(&self) -> bool {
        self.leaves
            .as_slice()
            .first()
            .is_some_and(|leaf| leaf.kinds == [SlotKind::Value])
    }

    pub(crate) fn next_leaf(&mut self) -> Result<&'p PlannedLeaf> {
        self.leaves
            .next()
            .ok_or_else(|| TypeError::construction("type tree changed during walk"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::ScalarSubtype;

    fn spec() -> TypeSpec {
        TypeSpec::json_object([
            ("x", TypeSpec::json_scalar(ScalarSubtype::Int, 32).unwrap()),
            (
                "y",
                TypeSpec::json_array(vec![
                    TypeSpec::scalar(ScalarSubtype::Unicode, 0).unwrap(),
                    TypeSpec::array_1d(ScalarSubtype::Float, 64, None).unwrap(),
                ]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn leaves_record_paths_and_offsets() {
        let plan = ConsumptionPlan::build(&spec()).unwrap();
        let summary: Vec<(String, usize, usize)> = plan
            .leaves()
            .iter()
            .map(|leaf| (leaf.path.to_string(), leaf.offset, leaf.count()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("$.x".to_string(), 0, 1),
                ("$.y[0]".to_string(), 1, 2),
                ("$.y[1]".to_string(), 3, 2),
            ]
        );
        assert_eq!(plan.total(), 5);
    }

    #[test]
    fn check_rejects_count_and_kind_mismatches() {
        let spec = spec();
        let good = ArgList::new()
            .with(1i32)
            .with_text("abc")
            .with_elements(&[1.0f64])
            .with_size(1);
        assert!(plan(&spec, &good).is_ok());

        let short = ArgList::new().with(1i32);
        assert!(matches!(
            plan(&spec, &short),
            Err(TypeError::ArgCount {
                expected: 5,
                found: 1
            })
        ));

        let swapped = ArgList::new()
            .with(1i32)
            .with_size(3)
            .with_text("abc")
            .with_elements(&[1.0f64]);
        assert!(matches!(
            plan(&spec, &swapped),
            Err(TypeError::SlotKind {
                index: 1,
                expected: SlotKind::Buffer,
                found: SlotKind::Size
            })
        ));
    }

    #[test]
    fn nested_value_takes_one_slot_at_a_generic_position() {
        let spec = TypeSpec::json_array(vec![
            TypeSpec::json_scalar(ScalarSubtype::Int, 32).unwrap(),
            TypeSpec::any(),
        ]);
        assert!(matches!(
            ConsumptionPlan::build(&spec),
            Err(TypeError::Uninitialized)
        ));

        let nested = crate::value::Value::new(TypeSpec::Direct, ArgList::new().with_text("x")).unwrap();
        let args = ArgList::new().with(1i32).with(nested);
        let plan = plan(&spec, &args).unwrap();
        let last = &plan.leaves()[1];
        assert_eq!(last.path.to_string(), "$[1]");
        assert_eq!(last.kinds, vec![SlotKind::Value]);
        assert_eq!(plan.total(), 2);

        // A concrete (non-generic) position never takes a nested value.
        let concrete = TypeSpec::json_array(vec![
            TypeSpec::json_scalar(ScalarSubtype::Int, 32).unwrap(),
            TypeSpec::Direct,
        ]);
        assert!(matches!(
            super::plan(&concrete, &args),
            Err(TypeError::ArgCount { .. })
        ));
    }

    #[test]
    fn uninitialized_child_reports_path() {
        let spec = TypeSpec::json_array(vec![TypeSpec::Direct, TypeSpec::any()]);
        let err = ConsumptionPlan::build(&spec).unwrap_err();
        assert!(matches!(err, TypeError::Uninitialized));
    }
}
