// Every view depending on the seed relation, at any depth. The seed is matched
// by oid so a qualified and an unqualified spelling of it are both excluded.
pub const GET_DEPENDENT_VIEWS: &str = "
WITH RECURSIVE vlist AS (
    SELECT c.oid::REGCLASS AS view_name
      FROM pg_class c
     WHERE c.oid = to_regclass($1::TEXT::CSTRING)
     UNION
    SELECT r.ev_class::REGCLASS AS view_name
      FROM pg_depend d
      JOIN pg_rewrite r ON (r.oid = d.objid)
      JOIN vlist ON (vlist.view_name = d.refobjid)
     WHERE d.refobjsubid != 0
)
SELECT view_name::TEXT AS view_name
  FROM vlist
 WHERE view_name::OID <> to_regclass($1::TEXT::CSTRING)::OID;
";

pub const GET_VIEW_DATA: &str = "
SELECT ns.nspname::TEXT AS schema_name
, vw.relname::TEXT AS view_name
, pg_get_userbyid(vw.relowner)::TEXT AS view_owner
, pg_get_viewdef(vw.oid, true) AS definition
FROM pg_class AS vw
JOIN pg_namespace ns ON ns.oid = vw.relnamespace
WHERE vw.oid = to_regclass($1::TEXT::CSTRING)
AND vw.relkind IN ('v', 'm');
";

pub const GET_VIEW_GRANTS: &str = "
SELECT grantee::TEXT AS grantee
, string_agg(privilege_type::TEXT, ', ' ORDER BY privilege_type) AS privileges
FROM information_schema.role_table_grants
WHERE table_schema = $1
    AND table_name = $2
GROUP BY grantee
ORDER BY grantee;
";
