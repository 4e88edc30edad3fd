use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;

use log::debug;
use num_bigint::BigUint;

use crate::cancel::CancelFlag;
use crate::dd::cache::{OpCache, OpKey};
use crate::dd::reference::Ref;
use crate::error::{Error, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct Node {
    variable: u32,
    low: Ref,
    high: Ref,
}

/// Handle of a variable permutation registered with [`Forest::register_permutation`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PermutationId(usize);

#[derive(Debug, Copy, Clone)]
pub struct ForestConfig {
    /// Maximum number of nodes; allocating past it yields [`Error::OutOfMemory`].
    pub node_limit: usize,
    pub cache_capacity: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            node_limit: 1 << 22,
            cache_capacity: 1 << 14,
        }
    }
}

/// Manager of a shared, reduced, ordered decision-diagram forest.
///
/// Variables are 1-indexed and ordered by index (smaller is closer to the root).
/// Edges carry a complement mark, the high edge of a stored node is always regular,
/// and the unique table guarantees that equal functions are equal [`Ref`]s.
/// Every operation that may allocate returns a [`Result`], so running out of nodes
/// surfaces as [`Error::OutOfMemory`] instead of a panic.
pub struct Forest {
    nodes: RefCell<Vec<Node>>,
    unique: RefCell<HashMap<Node, u32>>,
    cache: RefCell<OpCache<OpKey, Ref>>,
    permutations: RefCell<Vec<HashMap<u32, u32>>>,
    node_limit: usize,
}

impl Forest {
    pub fn new(config: ForestConfig) -> Self {
        let sentinel = Node {
            variable: 0,
            low: Ref::ZERO,
            high: Ref::ZERO,
        };
        // Index 0 is never used, index 1 is the terminal node.
        let nodes = vec![sentinel, sentinel];
        Self {
            nodes: RefCell::new(nodes),
            unique: RefCell::new(HashMap::new()),
            cache: RefCell::new(OpCache::with_capacity(config.cache_capacity)),
            permutations: RefCell::new(Vec::new()),
            node_limit: config.node_limit.max(2),
        }
    }
}

impl Default for Forest {
    fn default() -> Self {
        Forest::new(ForestConfig::default())
    }
}

impl Debug for Forest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = self.cache.borrow();
        f.debug_struct("Forest")
            .field("nodes", &self.nodes.borrow().len())
            .field("node_limit", &self.node_limit)
            .field("cache_hits", &cache.hits())
            .field("cache_misses", &cache.misses())
            .finish()
    }
}

impl Forest {
    fn node(&self, index: usize) -> Node {
        self.nodes.borrow()[index]
    }

    /// Top variable of `f`, or `u32::MAX` for terminals.
    fn top_var(&self, f: Ref) -> u32 {
        if f.is_terminal() {
            u32::MAX
        } else {
            self.node(f.index()).variable
        }
    }

    pub fn variable(&self, f: Ref) -> Option<u32> {
        if f.is_terminal() {
            None
        } else {
            Some(self.node(f.index()).variable)
        }
    }

    pub fn low_node(&self, f: Ref) -> Ref {
        let low = self.node(f.index()).low;
        if f.is_negated() {
            -low
        } else {
            low
        }
    }

    pub fn high_node(&self, f: Ref) -> Ref {
        let high = self.node(f.index()).high;
        if f.is_negated() {
            -high
        } else {
            high
        }
    }

    fn cofactors(&self, f: Ref, v: u32) -> (Ref, Ref) {
        if self.top_var(f) != v {
            return (f, f);
        }
        (self.low_node(f), self.high_node(f))
    }

    /// Total number of allocated nodes, the terminal included.
    pub fn allocated(&self) -> usize {
        self.nodes.borrow().len() - 1
    }

    pub fn cache_stats(&self) -> (usize, usize) {
        let cache = self.cache.borrow();
        (cache.hits(), cache.misses())
    }

    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    pub fn mk_node(&self, v: u32, low: Ref, high: Ref) -> Result<Ref> {
        if v == 0 {
            return Err(Error::assertion("variable index should not be zero"));
        }
        debug_assert!(self.top_var(low) > v && self.top_var(high) > v);

        if low == high {
            return Ok(low);
        }
        // Canonicity: the high edge of a stored node is regular.
        if high.is_negated() {
            return Ok(-self.mk_node(v, -low, -high)?);
        }

        let node = Node {
            variable: v,
            low,
            high,
        };
        if let Some(&i) = self.unique.borrow().get(&node) {
            return Ok(Ref::positive(i));
        }

        let mut nodes = self.nodes.borrow_mut();
        if nodes.len() >= self.node_limit {
            return Err(Error::OutOfMemory(format!(
                "decision-diagram forest exceeded {} nodes",
                self.node_limit
            )));
        }
        let i = nodes.len() as u32;
        nodes.push(node);
        drop(nodes);
        self.unique.borrow_mut().insert(node, i);
        Ok(Ref::positive(i))
    }

    pub fn mk_var(&self, v: u32) -> Result<Ref> {
        self.mk_node(v, Ref::ZERO, Ref::ONE)
    }

    /// Conjunction of the positive literals of `vars`.
    pub fn cube(&self, vars: impl IntoIterator<Item = u32>) -> Result<Ref> {
        let mut vars = vars.into_iter().collect::<Vec<_>>();
        vars.sort_unstable_by(|a, b| b.cmp(a));
        vars.dedup();
        let mut current = Ref::ONE;
        for v in vars {
            current = self.mk_node(v, Ref::ZERO, current)?;
        }
        Ok(current)
    }

    /// Conjunction of literals given as `(variable, value)` pairs.
    pub fn minterm(&self, literals: impl IntoIterator<Item = (u32, bool)>) -> Result<Ref> {
        let mut literals = literals.into_iter().collect::<Vec<_>>();
        literals.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        let mut current = Ref::ONE;
        for (v, value) in literals {
            current = if value {
                self.mk_node(v, Ref::ZERO, current)?
            } else {
                self.mk_node(v, current, Ref::ZERO)?
            };
        }
        Ok(current)
    }

    /// If-then-else: `(f ∧ g) ∨ (¬f ∧ h)`.
    pub fn ite(&self, f: Ref, g: Ref, h: Ref) -> Result<Ref> {
        // Base cases:
        //   ite(1,G,H) => G
        //   ite(0,G,H) => H
        //   ite(F,G,G) => G
        //   ite(F,1,0) => F
        //   ite(F,0,1) => ~F
        if f == Ref::ONE {
            return Ok(g);
        }
        if f == Ref::ZERO {
            return Ok(h);
        }
        if g == h {
            return Ok(g);
        }
        if g == Ref::ONE && h == Ref::ZERO {
            return Ok(f);
        }
        if g == Ref::ZERO && h == Ref::ONE {
            return Ok(-f);
        }

        // Standard triples:
        //   ite(F,F,H) => ite(F,1,H)
        //   ite(F,~F,H) => ite(F,0,H)
        //   ite(F,G,F) => ite(F,G,0)
        //   ite(F,G,~F) => ite(F,G,1)
        let g1 = if g == f {
            Ref::ONE
        } else if g == -f {
            Ref::ZERO
        } else {
            g
        };
        let h1 = if h == f {
            Ref::ZERO
        } else if h == -f {
            Ref::ONE
        } else {
            h
        };
        if g1 != g || h1 != h {
            return self.ite(f, g1, h1);
        }

        // ite(~F,G,H) => ite(F,H,G)
        let (f, g, h) = if f.is_negated() { (-f, h, g) } else { (f, g, h) };
        // ite(F,~G,H) => ~ite(F,G,~H)
        let (g, h, negate) = if g.is_negated() {
            (-g, -h, true)
        } else {
            (g, h, false)
        };

        let key = OpKey::Ite(f, g, h);
        let cached = self.cache.borrow_mut().get(&key);
        let res = match cached {
            Some(res) => res,
            None => {
                let m = self.top_var(f).min(self.top_var(g)).min(self.top_var(h));
                let (f0, f1) = self.cofactors(f, m);
                let (g0, g1) = self.cofactors(g, m);
                let (h0, h1) = self.cofactors(h, m);
                let e = self.ite(f0, g0, h0)?;
                let t = self.ite(f1, g1, h1)?;
                let res = self.mk_node(m, e, t)?;
                self.cache.borrow_mut().insert(key, res);
                res
            }
        };
        Ok(if negate { -res } else { res })
    }

    pub fn not(&self, f: Ref) -> Ref {
        -f
    }

    pub fn and(&self, f: Ref, g: Ref) -> Result<Ref> {
        self.ite(f, g, Ref::ZERO)
    }

    pub fn or(&self, f: Ref, g: Ref) -> Result<Ref> {
        self.ite(f, Ref::ONE, g)
    }

    pub fn xor(&self, f: Ref, g: Ref) -> Result<Ref> {
        self.ite(f, -g, g)
    }

    /// `f ∧ ¬g`
    pub fn diff(&self, f: Ref, g: Ref) -> Result<Ref> {
        self.ite(g, Ref::ZERO, f)
    }

    pub fn implies(&self, f: Ref, g: Ref) -> Result<bool> {
        Ok(self.diff(f, g)? == Ref::ZERO)
    }

    /// Existential quantification of the variables of the positive cube `cube`.
    pub fn exists(&self, f: Ref, cube: Ref) -> Result<Ref> {
        if f.is_terminal() || cube == Ref::ONE {
            return Ok(f);
        }
        let v = self.top_var(f);
        let mut cube = cube;
        while cube != Ref::ONE && self.top_var(cube) < v {
            cube = self.high_node(cube);
        }
        if cube == Ref::ONE {
            return Ok(f);
        }

        let key = OpKey::Exists(f, cube);
        if let Some(res) = self.cache.borrow_mut().get(&key) {
            return Ok(res);
        }

        let (f0, f1) = self.cofactors(f, v);
        let res = if self.top_var(cube) == v {
            let rest = self.high_node(cube);
            let r0 = self.exists(f0, rest)?;
            if r0 == Ref::ONE {
                Ref::ONE
            } else {
                let r1 = self.exists(f1, rest)?;
                self.or(r0, r1)?
            }
        } else {
            let r0 = self.exists(f0, cube)?;
            let r1 = self.exists(f1, cube)?;
            self.mk_node(v, r0, r1)?
        };
        self.cache.borrow_mut().insert(key, res);
        Ok(res)
    }

    /// Relational product `∃cube. f ∧ g`, without building `f ∧ g` first.
    pub fn and_exists(&self, f: Ref, g: Ref, cube: Ref) -> Result<Ref> {
        if f == Ref::ZERO || g == Ref::ZERO || f == -g {
            return Ok(Ref::ZERO);
        }
        if f == Ref::ONE || f == g {
            return self.exists(g, cube);
        }
        if g == Ref::ONE {
            return self.exists(f, cube);
        }
        if cube == Ref::ONE {
            return self.and(f, g);
        }

        let (f, g) = if f.raw() <= g.raw() { (f, g) } else { (g, f) };
        let v = self.top_var(f).min(self.top_var(g));
        let mut cube = cube;
        while cube != Ref::ONE && self.top_var(cube) < v {
            cube = self.high_node(cube);
        }
        if cube == Ref::ONE {
            return self.and(f, g);
        }

        let key = OpKey::AndExists(f, g, cube);
        if let Some(res) = self.cache.borrow_mut().get(&key) {
            return Ok(res);
        }

        let (f0, f1) = self.cofactors(f, v);
        let (g0, g1) = self.cofactors(g, v);
        let res = if self.top_var(cube) == v {
            let rest = self.high_node(cube);
            let r0 = self.and_exists(f0, g0, rest)?;
            if r0 == Ref::ONE {
                Ref::ONE
            } else {
                let r1 = self.and_exists(f1, g1, rest)?;
                self.or(r0, r1)?
            }
        } else {
            let r0 = self.and_exists(f0, g0, cube)?;
            let r1 = self.and_exists(f1, g1, cube)?;
            self.mk_node(v, r0, r1)?
        };
        self.cache.borrow_mut().insert(key, res);
        Ok(res)
    }

    /// Registers a variable renaming. Variables missing from `pairs` are kept.
    pub fn register_permutation(&self, pairs: impl IntoIterator<Item = (u32, u32)>) -> PermutationId {
        let mut permutations = self.permutations.borrow_mut();
        permutations.push(pairs.into_iter().collect());
        PermutationId(permutations.len() - 1)
    }

    pub fn rename(&self, f: Ref, perm: PermutationId) -> Result<Ref> {
        let permutations = self.permutations.borrow();
        let map = permutations
            .get(perm.0)
            .ok_or_else(|| Error::assertion(format!("unknown permutation {}", perm.0)))?;
        self.rename_rec(f, perm.0, map)
    }

    fn rename_rec(&self, f: Ref, id: usize, map: &HashMap<u32, u32>) -> Result<Ref> {
        if f.is_terminal() {
            return Ok(f);
        }
        if f.is_negated() {
            return Ok(-self.rename_rec(-f, id, map)?);
        }

        let key = OpKey::Rename(f, id);
        if let Some(res) = self.cache.borrow_mut().get(&key) {
            return Ok(res);
        }

        let node = self.node(f.index());
        let low = self.rename_rec(node.low, id, map)?;
        let high = self.rename_rec(node.high, id, map)?;
        let v = map.get(&node.variable).copied().unwrap_or(node.variable);
        // Going through ITE keeps the result ordered even if the renaming is not monotone.
        let x = self.mk_var(v)?;
        let res = self.ite(x, high, low)?;
        self.cache.borrow_mut().insert(key, res);
        Ok(res)
    }

    /// Evaluates `f` under a total assignment.
    pub fn eval(&self, f: Ref, assignment: impl Fn(u32) -> bool) -> bool {
        let mut current = f;
        while !current.is_terminal() {
            let v = self.top_var(current);
            current = if assignment(v) {
                self.high_node(current)
            } else {
                self.low_node(current)
            };
        }
        current == Ref::ONE
    }

    /// Number of assignments to `vars` satisfying `f`.
    ///
    /// `f` must not depend on variables outside `vars`.
    pub fn sat_count_over(&self, f: Ref, vars: &[u32]) -> Result<BigUint> {
        let mut vars = vars.to_vec();
        vars.sort_unstable();
        vars.dedup();
        let mut memo = HashMap::new();
        let top = self.position(f, &vars)?;
        let count = self.count_rec(f, &vars, &mut memo)?;
        Ok(count << top)
    }

    fn position(&self, f: Ref, vars: &[u32]) -> Result<usize> {
        if f.is_terminal() {
            return Ok(vars.len());
        }
        let v = self.top_var(f);
        vars.binary_search(&v)
            .map_err(|_| Error::assertion(format!("diagram depends on x{} outside the counted variables", v)))
    }

    /// Counts assignments to `vars[position(f)..]`.
    fn count_rec(&self, f: Ref, vars: &[u32], memo: &mut HashMap<usize, BigUint>) -> Result<BigUint> {
        if f == Ref::ONE {
            return Ok(BigUint::from(1u32));
        }
        if f == Ref::ZERO {
            return Ok(BigUint::from(0u32));
        }
        let p = self.position(f, vars)?;
        if f.is_negated() {
            let total = BigUint::from(1u32) << (vars.len() - p);
            let count = self.count_rec(-f, vars, memo)?;
            return Ok(total - count);
        }
        if let Some(count) = memo.get(&f.index()) {
            return Ok(count.clone());
        }

        let node = self.node(f.index());
        let p_low = self.position(node.low, vars)?;
        let p_high = self.position(node.high, vars)?;
        let low = self.count_rec(node.low, vars, memo)? << (p_low - p - 1);
        let high = self.count_rec(node.high, vars, memo)? << (p_high - p - 1);
        let count = low + high;
        memo.insert(f.index(), count.clone());
        Ok(count)
    }

    /// Calls `visit` with every satisfying assignment of `vars` (in order, false before true).
    ///
    /// Variables outside `vars` are treated existentially.
    pub fn for_each_minterm(
        &self,
        f: Ref,
        vars: &[u32],
        cancel: &CancelFlag,
        visit: &mut dyn FnMut(&[bool]),
    ) -> Result<()> {
        let mut bits = Vec::with_capacity(vars.len());
        self.enumerate(f, vars, &mut bits, cancel, visit)
    }

    fn enumerate(
        &self,
        f: Ref,
        vars: &[u32],
        bits: &mut Vec<bool>,
        cancel: &CancelFlag,
        visit: &mut dyn FnMut(&[bool]),
    ) -> Result<()> {
        if f == Ref::ZERO {
            return Ok(());
        }
        let depth = bits.len();
        if depth == vars.len() {
            visit(bits);
            return Ok(());
        }
        cancel.check()?;
        let (f0, f1) = self.cofactors(f, vars[depth]);
        bits.push(false);
        self.enumerate(f0, vars, bits, cancel, visit)?;
        bits.pop();
        bits.push(true);
        self.enumerate(f1, vars, bits, cancel, visit)?;
        bits.pop();
        Ok(())
    }

    /// Some minterm over `vars` contained in `f` (prefers false values), or None if `f` is empty.
    pub fn pick_minterm(&self, f: Ref, vars: &[u32]) -> Result<Option<Ref>> {
        if f == Ref::ZERO {
            return Ok(None);
        }
        let mut current = f;
        let mut literals = Vec::with_capacity(vars.len());
        for &v in vars {
            let (f0, f1) = self.cofactors(current, v);
            if f0 != Ref::ZERO {
                literals.push((v, false));
                current = f0;
            } else {
                literals.push((v, true));
                current = f1;
            }
        }
        Ok(Some(self.minterm(literals)?))
    }

    /// Number of distinct nodes reachable from `f`, the terminal included.
    pub fn node_count(&self, f: Ref) -> usize {
        let mut visited = std::collections::HashSet::new();
        let mut stack = vec![f.index()];
        while let Some(i) = stack.pop() {
            if visited.insert(i) && i != 1 {
                let node = self.node(i);
                stack.push(node.low.index());
                stack.push(node.high.index());
            }
        }
        debug!("node_count({}) = {}", f, visited.len());
        visited.len()
    }
}
